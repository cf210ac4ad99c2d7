use std::sync::Arc;
use std::time::Instant;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::app::{SessionEvent, SessionSink};
use crate::cancel::CancelToken;
use crate::coordinator::Coordinator;
use crate::domain::{CacheKey, ImageCandidate, SourceConfig};
use crate::error::BoxartError;
use crate::persist::Persister;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Searching,
    Presenting,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    /// Search even when artwork is already cached, e.g. to replace it.
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Cached(Utf8PathBuf),
    Candidates(Vec<ImageCandidate>),
}

/// What the host needs to show a freshly stored image right away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtworkUpdate {
    pub platform: String,
    pub title: String,
    pub path: String,
    /// Changes on every store so the host can bypass its own image cache.
    pub cache_buster: String,
}

/// One picker: a cache check, at most one search in flight, then a pick.
///
/// `Idle -> Searching -> Presenting -> Idle`. A cache hit keeps the session idle; a failed
/// pick keeps the candidates on offer.
pub struct ResolutionSession {
    key: CacheKey,
    coordinator: Coordinator,
    persister: Arc<Persister>,
    state: SessionState,
    candidates: Vec<ImageCandidate>,
    cancel: CancelToken,
}

impl ResolutionSession {
    pub fn new(key: CacheKey, coordinator: Coordinator, persister: Arc<Persister>) -> Self {
        Self {
            key,
            coordinator,
            persister,
            state: SessionState::Idle,
            candidates: Vec::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn candidates(&self) -> &[ImageCandidate] {
        &self.candidates
    }

    /// Handle for another thread to abandon this session's in-flight search.
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn lookup(&self) -> Option<Utf8PathBuf> {
        self.persister.store().lookup(&self.key)
    }

    pub fn search(
        &mut self,
        config: &SourceConfig,
        options: SearchOptions,
        sink: &dyn SessionSink,
    ) -> Result<SearchOutcome, BoxartError> {
        self.cancel.check()?;
        if !options.force {
            if let Some(path) = self.lookup() {
                self.reset();
                return Ok(SearchOutcome::Cached(path));
            }
        }

        self.state = SessionState::Searching;
        self.candidates.clear();
        sink.event(SessionEvent::Searching {
            key: self.key.clone(),
            sources: self.coordinator.plan(&self.key.platform, config),
        });

        let start = Instant::now();
        let resolved =
            self.coordinator
                .resolve(&self.key.title, &self.key.platform, config, &self.cancel);
        let candidates = match resolved {
            Ok(candidates) => candidates,
            Err(err) => {
                self.reset();
                return Err(err);
            }
        };

        self.state = SessionState::Presenting;
        self.candidates = candidates.clone();
        sink.event(SessionEvent::Presenting {
            key: self.key.clone(),
            count: candidates.len(),
            elapsed: start.elapsed(),
        });
        Ok(SearchOutcome::Candidates(candidates))
    }

    /// Stores `candidate`, which must be one of the candidates on offer.
    pub fn select(
        &mut self,
        candidate: &ImageCandidate,
        sink: &dyn SessionSink,
    ) -> Result<ArtworkUpdate, BoxartError> {
        if self.state != SessionState::Presenting {
            return Err(BoxartError::InvalidSession(format!(
                "no candidates on offer for {}",
                self.key
            )));
        }
        if !self.candidates.contains(candidate) {
            return Err(BoxartError::InvalidSession(format!(
                "{} was not offered for {}",
                candidate.url(),
                self.key
            )));
        }

        match self.persister.persist(candidate.url(), &self.key) {
            Ok(path) => {
                let update = artwork_update(&self.key, path);
                self.reset();
                sink.event(SessionEvent::ArtworkUpdated(update.clone()));
                Ok(update)
            }
            Err(err) => {
                sink.event(SessionEvent::PersistFailed {
                    key: self.key.clone(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Abandons the session: in-flight work is told to stop and its results are dropped.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.reset();
    }

    fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.candidates.clear();
    }
}

pub(crate) fn artwork_update(key: &CacheKey, path: Utf8PathBuf) -> ArtworkUpdate {
    ArtworkUpdate {
        platform: key.platform.to_string(),
        title: key.title.to_string(),
        path: path.into_string(),
        cache_buster: chrono::Utc::now().timestamp_millis().to_string(),
    }
}
