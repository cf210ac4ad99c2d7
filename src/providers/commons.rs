use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::domain::{CandidateMetadata, ImageCandidate, SourceId};
use crate::error::BoxartError;
use crate::http::Transport;
use crate::providers::{CoverSource, SourceQuery, build_url, get_json, parse_mismatch};

const API_URL: &str = "https://commons.wikimedia.org/w/api.php";
const REDIRECT_BASE: &str = "https://commons.wikimedia.org/wiki/Special:Redirect/file";

static BOX_ART_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"box|package|case").unwrap());

#[derive(Clone)]
pub struct CommonsSource {
    transport: Arc<dyn Transport>,
}

impl CommonsSource {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl CoverSource for CommonsSource {
    fn id(&self) -> SourceId {
        SourceId::Commons
    }

    fn opt_in(&self) -> bool {
        true
    }

    fn search(&self, query: &SourceQuery) -> Result<Vec<ImageCandidate>, BoxartError> {
        let search = format!("{} video game cover", query.title);
        let url = build_url(
            self.id(),
            API_URL,
            &[],
            &[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", search.as_str()),
                ("srnamespace", "6"),
                ("srlimit", "20"),
                ("format", "json"),
            ],
        )?;
        let response = get_json(self.transport.as_ref(), self.id(), &url, &[])?;
        let results = response
            .get("query")
            .and_then(|query| query.get("search"))
            .and_then(Value::as_array)
            .ok_or_else(|| parse_mismatch(self.id(), "search response without results"))?;

        results
            .iter()
            .filter_map(|result| result.get("title").and_then(Value::as_str))
            .filter_map(|title| title.strip_prefix("File:"))
            .map(|file_name| {
                let url = build_url(self.id(), REDIRECT_BASE, &[file_name], &[])?;
                let lower = url.to_lowercase();
                let metadata = CandidateMetadata {
                    title: Some(file_name.to_string()),
                    is_cover_art: Some(lower.contains("cover")),
                    is_box_art: Some(BOX_ART_RE.is_match(&lower)),
                    ..CandidateMetadata::default()
                };
                Ok(ImageCandidate::new(url, self.id()).with_metadata(metadata))
            })
            .collect()
    }
}
