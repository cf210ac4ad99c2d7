use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::coordinator::Coordinator;
use crate::domain::{CacheKey, CanonicalTitle, ImageCandidate, PlatformId, SourceConfig, SourceId};
use crate::error::BoxartError;
use crate::http::Transport;
use crate::persist::Persister;
use crate::session::{ArtworkUpdate, ResolutionSession, SearchOptions, SearchOutcome, artwork_update};
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct LookupResult {
    pub platform: String,
    pub title: String,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub platform: String,
    pub title: String,
    pub cached: Option<String>,
    pub sources: Vec<SourceId>,
    pub candidates: Vec<ImageCandidate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectResult {
    #[serde(flatten)]
    pub update: ArtworkUpdate,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchAction {
    Cached,
    Downloaded,
    NoCandidates,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult {
    pub title: String,
    pub action: BatchAction,
    pub path: Option<String>,
    pub source: Option<SourceId>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub platform: String,
    pub items: Vec<BatchItemResult>,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Searching {
        key: CacheKey,
        sources: Vec<SourceId>,
    },
    Presenting {
        key: CacheKey,
        count: usize,
        elapsed: Duration,
    },
    ArtworkUpdated(ArtworkUpdate),
    PersistFailed {
        key: CacheKey,
        message: String,
    },
}

pub trait SessionSink {
    fn event(&self, event: SessionEvent);
}

/// Entry point for the host: cache lookups, searches, picks and batch fills.
#[derive(Clone)]
pub struct App {
    coordinator: Coordinator,
    persister: Arc<Persister>,
}

impl App {
    pub fn new(store: Store, transport: Arc<dyn Transport>) -> Self {
        let coordinator = Coordinator::with_default_sources(transport.clone());
        Self::with_coordinator(store, coordinator, transport)
    }

    pub fn with_coordinator(
        store: Store,
        coordinator: Coordinator,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            coordinator,
            persister: Arc::new(Persister::new(store, transport)),
        }
    }

    pub fn store(&self) -> &Store {
        self.persister.store()
    }

    pub fn open_session(&self, platform: &PlatformId, title: &str) -> ResolutionSession {
        ResolutionSession::new(
            key(platform, title),
            self.coordinator.clone(),
            self.persister.clone(),
        )
    }

    pub fn lookup(&self, platform: &PlatformId, title: &str) -> LookupResult {
        let key = key(platform, title);
        LookupResult {
            platform: platform.to_string(),
            title: key.title.to_string(),
            path: self.store().lookup(&key).map(|path| path.to_string()),
        }
    }

    pub fn search(
        &self,
        platform: &PlatformId,
        title: &str,
        config: &SourceConfig,
        options: SearchOptions,
        sink: &dyn SessionSink,
    ) -> Result<SearchResult, BoxartError> {
        let mut session = self.open_session(platform, title);
        let outcome = session.search(config, options, sink)?;
        let (cached, sources, candidates) = match outcome {
            SearchOutcome::Cached(path) => (Some(path.to_string()), Vec::new(), Vec::new()),
            SearchOutcome::Candidates(candidates) => (
                None,
                self.coordinator.plan(platform, config),
                candidates,
            ),
        };
        Ok(SearchResult {
            platform: platform.to_string(),
            title: session.key().title.to_string(),
            cached,
            sources,
            candidates,
        })
    }

    /// Stores a candidate picked outside a session, e.g. from an earlier search result.
    pub fn select(
        &self,
        candidate: &ImageCandidate,
        platform: &PlatformId,
        title: &str,
        sink: &dyn SessionSink,
    ) -> Result<SelectResult, BoxartError> {
        self.select_url(candidate.url(), platform, title, sink)
    }

    pub fn select_url(
        &self,
        url: &str,
        platform: &PlatformId,
        title: &str,
        sink: &dyn SessionSink,
    ) -> Result<SelectResult, BoxartError> {
        let key = key(platform, title);
        match self.persister.persist(url, &key) {
            Ok(path) => {
                let update = artwork_update(&key, path);
                sink.event(SessionEvent::ArtworkUpdated(update.clone()));
                Ok(SelectResult {
                    update,
                    url: url.to_string(),
                })
            }
            Err(err) => {
                sink.event(SessionEvent::PersistFailed {
                    key,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Batch pass: every title without artwork is searched and gets the first candidate that
    /// downloads and stores successfully.
    pub fn fill_missing<'a>(
        &self,
        platform: &PlatformId,
        titles: impl IntoIterator<Item = &'a str>,
        config: &SourceConfig,
        sink: &dyn SessionSink,
    ) -> Result<BatchResult, BoxartError> {
        self.store().images_dir(platform)?;

        let mut items = Vec::new();
        for title in canonical_titles(titles) {
            items.push(self.fill_one(platform, &title, config, sink)?);
        }
        Ok(BatchResult {
            platform: platform.to_string(),
            items,
        })
    }

    fn fill_one(
        &self,
        platform: &PlatformId,
        title: &CanonicalTitle,
        config: &SourceConfig,
        sink: &dyn SessionSink,
    ) -> Result<BatchItemResult, BoxartError> {
        let mut session = self.open_session(platform, title.as_str());
        let candidates = match session.search(config, SearchOptions::default(), sink)? {
            SearchOutcome::Cached(path) => {
                return Ok(BatchItemResult {
                    title: title.to_string(),
                    action: BatchAction::Cached,
                    path: Some(path.to_string()),
                    source: None,
                    error: None,
                });
            }
            SearchOutcome::Candidates(candidates) => candidates,
        };
        if candidates.is_empty() {
            return Ok(BatchItemResult {
                title: title.to_string(),
                action: BatchAction::NoCandidates,
                path: None,
                source: None,
                error: None,
            });
        }

        let mut last_error = None;
        for candidate in &candidates {
            match session.select(candidate, sink) {
                Ok(update) => {
                    return Ok(BatchItemResult {
                        title: title.to_string(),
                        action: BatchAction::Downloaded,
                        path: Some(update.path.clone()),
                        source: Some(candidate.source()),
                        error: None,
                    });
                }
                Err(err) => {
                    warn!(title = %title, url = candidate.url(), "candidate rejected: {err}");
                    last_error = Some(err.to_string());
                }
            }
        }
        Ok(BatchItemResult {
            title: title.to_string(),
            action: BatchAction::Failed,
            path: None,
            source: None,
            error: last_error,
        })
    }
}

fn key(platform: &PlatformId, title: &str) -> CacheKey {
    CacheKey::new(platform.clone(), CanonicalTitle::new(title))
}

/// Canonical titles in input order, each once.
fn canonical_titles<'a>(titles: impl IntoIterator<Item = &'a str>) -> Vec<CanonicalTitle> {
    let mut list: Vec<CanonicalTitle> = Vec::new();
    for title in titles.into_iter().map(CanonicalTitle::new) {
        if !list.contains(&title) {
            list.push(title);
        }
    }
    list
}
