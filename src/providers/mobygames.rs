use std::sync::Arc;

use crate::domain::{CandidateMetadata, ImageCandidate, SourceId};
use crate::error::BoxartError;
use crate::http::Transport;
use crate::providers::html::{self, absolutize};
use crate::providers::{CoverSource, SourceQuery, build_url, get_text, parse_mismatch};

const ORIGIN: &str = "https://www.mobygames.com";

/// MobyGames: the first game on the search page, then its covers page for the platform.
#[derive(Clone)]
pub struct MobyGamesSource {
    transport: Arc<dyn Transport>,
}

impl MobyGamesSource {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl CoverSource for MobyGamesSource {
    fn id(&self) -> SourceId {
        SourceId::Mobygames
    }

    fn search(&self, query: &SourceQuery) -> Result<Vec<ImageCandidate>, BoxartError> {
        let search_url = build_url(
            self.id(),
            &format!("{ORIGIN}/search/"),
            &[],
            &[("q", query.title.as_str())],
        )?;
        let page = get_text(self.transport.as_ref(), self.id(), &search_url)?;
        let Some((game_href, game_name)) = first_game_link(&page) else {
            return Ok(Vec::new());
        };

        query.cancel.check()?;

        let covers_url = covers_page(&game_href, query.platform.as_str());
        let covers = get_text(self.transport.as_ref(), self.id(), &covers_url)?;
        let images = cover_images(&covers);
        if images.is_empty() {
            return Err(parse_mismatch(self.id(), "covers page without images"));
        }

        Ok(images
            .into_iter()
            .map(|url| {
                ImageCandidate::new(url, self.id()).with_metadata(CandidateMetadata {
                    title: game_name.clone(),
                    ..CandidateMetadata::default()
                })
            })
            .collect())
    }
}

/// First link inside the result table under `#main`.
fn first_game_link(page: &str) -> Option<(String, Option<String>)> {
    let main = html::find_by_id(page, "main")?;
    let table = main.first(Some("table"), None)?;
    table.select(Some("a"), None).into_iter().find_map(|link| {
        let href = link.attr("href")?.to_string();
        let text = link.text();
        Some((href, (!text.is_empty()).then_some(text)))
    })
}

fn covers_page(game_href: &str, platform: &str) -> String {
    let game_url = absolutize(ORIGIN, game_href);
    let separator = if game_url.ends_with('/') { "" } else { "/" };
    format!("{game_url}{separator}covers/{platform}")
}

fn cover_images(page: &str) -> Vec<String> {
    html::select(page, None, Some("img-holder"))
        .into_iter()
        .filter_map(|holder| {
            let img = holder.first(Some("img"), None)?;
            img.attr("src").map(|src| absolutize(ORIGIN, src))
        })
        .collect()
}
