use std::sync::Arc;

use serde_json::Value;

use crate::domain::{CandidateMetadata, ImageCandidate, SourceId};
use crate::error::BoxartError;
use crate::http::Transport;
use crate::providers::{CoverSource, SourceQuery, build_url, get_json, parse_mismatch};

const API_BASE: &str = "https://www.steamgriddb.com/api/v2";

/// SteamGridDB: autocomplete search, then the grid images of the first game it suggests.
#[derive(Clone)]
pub struct SteamGridSource {
    transport: Arc<dyn Transport>,
}

impl SteamGridSource {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl CoverSource for SteamGridSource {
    fn id(&self) -> SourceId {
        SourceId::Steamgrid
    }

    fn requires_credential(&self) -> bool {
        true
    }

    fn search(&self, query: &SourceQuery) -> Result<Vec<ImageCandidate>, BoxartError> {
        let key = query
            .api_key
            .as_deref()
            .ok_or_else(|| parse_mismatch(self.id(), "no API key configured"))?;
        let auth = format!("Bearer {key}");
        let headers = [("Authorization", auth.as_str())];

        let search_url = build_url(
            self.id(),
            API_BASE,
            &["search", "autocomplete", query.title.as_str()],
            &[],
        )?;
        let search = get_json(self.transport.as_ref(), self.id(), &search_url, &headers)?;
        let games = data_array(&search).ok_or_else(|| parse_mismatch(self.id(), "no data"))?;
        let Some(game) = games.first() else {
            return Ok(Vec::new());
        };
        let game_id = game
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| parse_mismatch(self.id(), "search result without id"))?
            .to_string();
        let game_name = game.get("name").and_then(Value::as_str).map(str::to_string);

        query.cancel.check()?;

        let grids_url = build_url(
            self.id(),
            API_BASE,
            &["grids", "game", game_id.as_str()],
            &[],
        )?;
        let grids = get_json(self.transport.as_ref(), self.id(), &grids_url, &headers)?;
        let grids = data_array(&grids).ok_or_else(|| parse_mismatch(self.id(), "no grids"))?;

        Ok(grids
            .iter()
            .filter_map(|grid| {
                let url = grid.get("url").and_then(Value::as_str)?;
                let metadata = CandidateMetadata {
                    title: game_name.clone(),
                    width: dimension(grid, "width"),
                    height: dimension(grid, "height"),
                    style: grid
                        .get("style")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    ..CandidateMetadata::default()
                };
                Some(ImageCandidate::new(url, self.id()).with_metadata(metadata))
            })
            .collect())
    }
}

/// `data` of a successful envelope; `None` when the API reports failure.
fn data_array(value: &Value) -> Option<&Vec<Value>> {
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    value.get("data").and_then(Value::as_array)
}

fn dimension(value: &Value, field: &str) -> Option<u32> {
    value
        .get(field)
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
}
