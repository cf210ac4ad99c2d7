//! Artwork sources. Each one turns a canonical title into image candidates from a single
//! external service and keeps every failure to itself.

pub mod commons;
pub mod exotica;
pub mod giantbomb;
pub mod html;
pub mod mobygames;
pub mod steamgrid;
pub mod uvlist;
pub mod wikipedia;

use std::sync::Arc;
use std::time::Instant;

use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::domain::{CanonicalTitle, ImageCandidate, PlatformId, SourceId};
use crate::error::BoxartError;
use crate::http::{HttpResponse, Transport};

pub use commons::CommonsSource;
pub use exotica::ExoticaSource;
pub use giantbomb::GiantBombSource;
pub use mobygames::MobyGamesSource;
pub use steamgrid::SteamGridSource;
pub use uvlist::UvListSource;
pub use wikipedia::WikipediaSource;

/// Everything a source gets to see for one lookup. Owned so it can move onto a worker.
#[derive(Debug, Clone)]
pub struct SourceQuery {
    pub title: CanonicalTitle,
    pub platform: PlatformId,
    pub api_key: Option<String>,
    pub cancel: CancelToken,
}

impl SourceQuery {
    pub fn new(title: CanonicalTitle, platform: PlatformId) -> Self {
        Self {
            title,
            platform,
            api_key: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

pub trait CoverSource: Send + Sync {
    fn id(&self) -> SourceId;

    /// Sources that need an API key are skipped when none is configured.
    fn requires_credential(&self) -> bool {
        false
    }

    fn applies_to(&self, _platform: &PlatformId) -> bool {
        true
    }

    /// Opt-in sources are skipped unless the configuration switches them on.
    fn opt_in(&self) -> bool {
        false
    }

    /// Talks to the service. Errors stay inside the source; see [`fetch_candidates`].
    ///
    /// [`fetch_candidates`]: CoverSource::fetch_candidates
    fn search(&self, query: &SourceQuery) -> Result<Vec<ImageCandidate>, BoxartError>;

    fn fetch_candidates(&self, query: &SourceQuery) -> Vec<ImageCandidate> {
        let start = Instant::now();
        match self.search(query) {
            Ok(candidates) => {
                info!(
                    source = %self.id(),
                    title = %query.title,
                    count = candidates.len(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "source finished"
                );
                candidates
            }
            Err(err) => {
                warn!(source = %self.id(), title = %query.title, "source failed: {err}");
                Vec::new()
            }
        }
    }
}

/// The built-in sources, in merge priority order.
pub fn default_sources(transport: Arc<dyn Transport>) -> Vec<Arc<dyn CoverSource>> {
    vec![
        Arc::new(SteamGridSource::new(transport.clone())),
        Arc::new(GiantBombSource::new(transport.clone())),
        Arc::new(MobyGamesSource::new(transport.clone())),
        Arc::new(ExoticaSource::new(transport.clone())),
        Arc::new(UvListSource::new(transport.clone())),
        Arc::new(WikipediaSource::new(transport.clone())),
        Arc::new(CommonsSource::new(transport)),
    ]
}

pub(crate) fn get_page(
    transport: &dyn Transport,
    source: SourceId,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<HttpResponse, BoxartError> {
    debug!(source = %source, url = %without_query(url), "request");
    let response = transport
        .get(url, headers)
        .map_err(|message| BoxartError::SourceUnreachable {
            adapter: source,
            message,
        })?;
    if !response.is_success() {
        return Err(BoxartError::SourceStatus {
            adapter: source,
            status: response.status,
        });
    }
    Ok(response)
}

pub(crate) fn get_text(
    transport: &dyn Transport,
    source: SourceId,
    url: &str,
) -> Result<String, BoxartError> {
    Ok(get_page(transport, source, url, &[])?.text())
}

pub(crate) fn get_json(
    transport: &dyn Transport,
    source: SourceId,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<Value, BoxartError> {
    get_page(transport, source, url, headers)?
        .json()
        .map_err(|err| BoxartError::ParseMismatch {
            adapter: source,
            message: err.to_string(),
        })
}

/// Appends percent-encoded path segments and query pairs to `base`.
pub(crate) fn build_url(
    source: SourceId,
    base: &str,
    segments: &[&str],
    params: &[(&str, &str)],
) -> Result<String, BoxartError> {
    let invalid = |message: String| BoxartError::ParseMismatch {
        adapter: source,
        message,
    };
    let mut url = Url::parse(base).map_err(|err| invalid(err.to_string()))?;
    if !segments.is_empty() {
        url.path_segments_mut()
            .map_err(|_| invalid(format!("{base} cannot take path segments")))?
            .pop_if_empty()
            .extend(segments);
    }
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url.to_string())
}

pub(crate) fn parse_mismatch(source: SourceId, message: impl Into<String>) -> BoxartError {
    BoxartError::ParseMismatch {
        adapter: source,
        message: message.into(),
    }
}

fn without_query(url: &str) -> &str {
    url.split_once('?').map(|(head, _)| head).unwrap_or(url)
}
