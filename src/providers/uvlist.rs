use std::sync::Arc;

use crate::domain::{CandidateMetadata, ImageCandidate, PlatformId, SourceId};
use crate::error::BoxartError;
use crate::http::Transport;
use crate::providers::html::{self, Element, absolutize};
use crate::providers::{CoverSource, SourceQuery, build_url, get_text, parse_mismatch};

const ORIGIN: &str = "https://www.uvlist.net";

/// UVList global search. Result rows carry a vendor badge, which is how the platform is told
/// apart; the game page holds the cover gallery.
#[derive(Clone)]
pub struct UvListSource {
    transport: Arc<dyn Transport>,
}

impl UvListSource {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

/// Badge class UVList puts on search rows for the platform's manufacturer.
pub fn vendor_badge(platform: &PlatformId) -> &'static str {
    match platform.as_str() {
        "pcengine" | "turbografx" => "comp_nec",
        "dreamcast" | "genesis" | "megadrive" | "saturn" | "mastersystem" | "gamegear" => {
            "comp_sega"
        }
        _ => "comp_ninte",
    }
}

impl CoverSource for UvListSource {
    fn id(&self) -> SourceId {
        SourceId::Uvlist
    }

    fn search(&self, query: &SourceQuery) -> Result<Vec<ImageCandidate>, BoxartError> {
        let search_url = build_url(
            self.id(),
            &format!("{ORIGIN}/globalsearch/"),
            &[],
            &[("t", query.title.as_str())],
        )?;
        let results = get_text(self.transport.as_ref(), self.id(), &search_url)?;
        let badge = vendor_badge(&query.platform);

        let matched = html::select(&results, Some("tr"), None)
            .into_iter()
            .filter(|row| has_badge(row, badge))
            .find_map(|row| {
                row.select(Some("a"), None).into_iter().find_map(|link| {
                    let text = link.text();
                    let href = link.attr("href")?;
                    query
                        .title
                        .matches(&text)
                        .then(|| (absolutize(ORIGIN, href), text))
                })
            });
        let Some((game_url, game_name)) = matched else {
            return Ok(Vec::new());
        };

        query.cancel.check()?;

        let page = get_text(self.transport.as_ref(), self.id(), &game_url)?;
        let images = game_images(&page);
        if images.is_empty() {
            return Err(parse_mismatch(self.id(), "game page without images"));
        }

        Ok(images
            .into_iter()
            .map(|url| {
                ImageCandidate::new(url, self.id()).with_metadata(CandidateMetadata {
                    title: Some(game_name.clone()),
                    ..CandidateMetadata::default()
                })
            })
            .collect())
    }
}

fn has_badge(row: &Element<'_>, badge: &str) -> bool {
    row.select(Some("span"), Some("badge-companies"))
        .iter()
        .any(|span| span.has_class(badge))
}

/// Gallery images first; the single main image only when there is no gallery.
fn game_images(page: &str) -> Vec<String> {
    let gallery: Vec<String> = html::select(page, Some("div"), Some("col_gold1"))
        .into_iter()
        .flat_map(|block| block.select(Some("img"), None))
        .filter_map(|img| img.attr("data-background-image").map(|src| absolutize(ORIGIN, src)))
        .collect();
    if !gallery.is_empty() {
        return gallery;
    }
    html::first(page, Some("div"), Some("mainImage"))
        .and_then(|block| block.first(Some("img"), None))
        .and_then(|img| img.attr("src").map(|src| absolutize(ORIGIN, src)))
        .into_iter()
        .collect()
}
