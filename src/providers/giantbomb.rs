use std::sync::Arc;

use serde_json::Value;

use crate::domain::{CandidateMetadata, ImageCandidate, SourceId};
use crate::error::BoxartError;
use crate::http::Transport;
use crate::providers::{CoverSource, SourceQuery, build_url, get_json, parse_mismatch};

const SEARCH_URL: &str = "https://www.giantbomb.com/api/search/";

#[derive(Clone)]
pub struct GiantBombSource {
    transport: Arc<dyn Transport>,
}

impl GiantBombSource {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl CoverSource for GiantBombSource {
    fn id(&self) -> SourceId {
        SourceId::Giantbomb
    }

    fn requires_credential(&self) -> bool {
        true
    }

    fn search(&self, query: &SourceQuery) -> Result<Vec<ImageCandidate>, BoxartError> {
        let key = query
            .api_key
            .as_deref()
            .ok_or_else(|| parse_mismatch(self.id(), "no API key configured"))?;
        let url = build_url(
            self.id(),
            SEARCH_URL,
            &[],
            &[
                ("api_key", key),
                ("format", "json"),
                ("query", query.title.as_str()),
                ("resources", "game"),
            ],
        )?;
        let response = get_json(self.transport.as_ref(), self.id(), &url, &[])?;
        let results = response
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| parse_mismatch(self.id(), "no results field"))?;

        Ok(results
            .iter()
            .filter_map(|result| {
                let url = result
                    .get("image")
                    .and_then(|image| image.get("super_url"))
                    .and_then(Value::as_str)
                    .filter(|url| !url.is_empty())?;
                let metadata = CandidateMetadata {
                    title: result
                        .get("name")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    ..CandidateMetadata::default()
                };
                Some(ImageCandidate::new(url, self.id()).with_metadata(metadata))
            })
            .collect())
    }
}
