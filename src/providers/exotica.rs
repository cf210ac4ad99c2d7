use std::sync::Arc;

use crate::domain::{ImageCandidate, PlatformId, SourceId};
use crate::error::BoxartError;
use crate::http::Transport;
use crate::providers::html::{self, absolutize};
use crate::providers::{CoverSource, SourceQuery, get_text, parse_mismatch};

const ORIGIN: &str = "https://www.exotica.org.uk";

/// Exotica's Amiga box scan wiki, indexed by first letter.
#[derive(Clone)]
pub struct ExoticaSource {
    transport: Arc<dyn Transport>,
}

impl ExoticaSource {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn gallery_url(letter: char) -> String {
        format!("{ORIGIN}/wiki/Amiga_Game_Box_Scans/{letter}")
    }
}

impl CoverSource for ExoticaSource {
    fn id(&self) -> SourceId {
        SourceId::Exotica
    }

    fn applies_to(&self, platform: &PlatformId) -> bool {
        platform.is_amiga()
    }

    fn search(&self, query: &SourceQuery) -> Result<Vec<ImageCandidate>, BoxartError> {
        let gallery_url = Self::gallery_url(query.title.first_letter());
        let gallery = get_text(self.transport.as_ref(), self.id(), &gallery_url)?;

        let game_page = html::select(&gallery, None, Some("gallerybox"))
            .into_iter()
            .find_map(|entry| {
                let caption = entry
                    .first(None, Some("gallerytext"))
                    .map(|text| text.text())
                    .unwrap_or_default();
                let href = entry
                    .first(Some("a"), Some("image"))
                    .and_then(|link| link.attr("href").map(str::to_string))?;
                let readable_href = href.replace('_', " ");
                (query.title.matches(&caption) || query.title.matches(&readable_href))
                    .then(|| absolutize(ORIGIN, &href))
            });
        let Some(game_page) = game_page else {
            return Ok(Vec::new());
        };

        query.cancel.check()?;

        let page = get_text(self.transport.as_ref(), self.id(), &game_page)?;
        let image = html::first(&page, Some("div"), Some("fullImageLink"))
            .and_then(|block| block.first(Some("a"), None))
            .and_then(|link| link.attr("href").map(|href| absolutize(ORIGIN, href)))
            .ok_or_else(|| parse_mismatch(self.id(), "file page without full image link"))?;

        Ok(vec![ImageCandidate::new(image, self.id())])
    }
}
