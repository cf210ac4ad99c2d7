use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::domain::{CanonicalTitle, ImageCandidate, PlatformId, SourceConfig, SourceId};
use crate::error::BoxartError;
use crate::http::Transport;
use crate::providers::{CoverSource, SourceQuery, default_sources};

/// How often a waiting coordinator looks at its cancellation token.
const CANCEL_POLL: Duration = Duration::from_millis(25);

/// Fans one lookup out to every applicable source and merges the answers in priority order.
#[derive(Clone)]
pub struct Coordinator {
    sources: Vec<Arc<dyn CoverSource>>,
}

impl Coordinator {
    /// Sources are kept in [`SourceId`] order no matter how they are passed in.
    pub fn new(mut sources: Vec<Arc<dyn CoverSource>>) -> Self {
        sources.sort_by_key(|source| source.id());
        Self { sources }
    }

    pub fn with_default_sources(transport: Arc<dyn Transport>) -> Self {
        Self::new(default_sources(transport))
    }

    /// Sources that would run for this platform and configuration, in merge order.
    pub fn plan(&self, platform: &PlatformId, config: &SourceConfig) -> Vec<SourceId> {
        self.applicable(platform, config)
            .map(|source| source.id())
            .collect()
    }

    fn applicable<'a>(
        &'a self,
        platform: &'a PlatformId,
        config: &'a SourceConfig,
    ) -> impl Iterator<Item = &'a Arc<dyn CoverSource>> + 'a {
        self.sources.iter().filter(move |source| {
            source.applies_to(platform)
                && (!source.requires_credential() || config.credential_for(source.id()).is_some())
                && (!source.opt_in() || config.opted_in(source.id()))
        })
    }

    /// Runs the applicable sources concurrently and waits for all of them, but no longer than
    /// `config.adapter_timeout`. Opt-in sources run only when `config` enables them. Late or panicked sources contribute nothing. Returns
    /// [`BoxartError::Cancelled`] if `cancel` fires while waiting.
    pub fn resolve(
        &self,
        title: &CanonicalTitle,
        platform: &PlatformId,
        config: &SourceConfig,
        cancel: &CancelToken,
    ) -> Result<Vec<ImageCandidate>, BoxartError> {
        cancel.check()?;
        let sources: Vec<Arc<dyn CoverSource>> =
            self.applicable(platform, config).cloned().collect();
        debug!(
            title = %title,
            platform = %platform,
            sources = ?sources.iter().map(|source| source.id()).collect::<Vec<_>>(),
            "resolving"
        );

        let (tx, rx) = mpsc::channel::<(usize, Vec<ImageCandidate>)>();
        let mut pending = 0usize;
        for (slot, source) in sources.iter().enumerate() {
            let query = SourceQuery::new(title.clone(), platform.clone())
                .with_api_key(config.credential_for(source.id()).map(str::to_string))
                .with_cancel(cancel.clone());
            let worker = source.clone();
            let tx = tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("boxart-{}", source.id()))
                .spawn(move || {
                    let candidates = worker.fetch_candidates(&query);
                    // The coordinator may have stopped listening; late results are dropped.
                    let _ = tx.send((slot, candidates));
                });
            match spawned {
                Ok(_) => pending += 1,
                Err(err) => warn!(source = %source.id(), "failed to start source: {err}"),
            }
        }
        drop(tx);

        let mut slots: Vec<Option<Vec<ImageCandidate>>> = vec![None; sources.len()];
        // A timeout too large for the clock means no deadline at all.
        let deadline = Instant::now().checked_add(config.adapter_timeout);
        while pending > 0 {
            cancel.check()?;
            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                for (slot, source) in sources.iter().enumerate() {
                    if slots[slot].is_none() {
                        warn!(source = %source.id(), title = %title, "source timed out");
                    }
                }
                break;
            }
            let wait = deadline.map_or(CANCEL_POLL, |deadline| CANCEL_POLL.min(deadline - now));
            match rx.recv_timeout(wait) {
                Ok((slot, candidates)) => {
                    slots[slot] = Some(candidates);
                    pending -= 1;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        cancel.check()?;

        Ok(slots.into_iter().flatten().flatten().collect())
    }
}
