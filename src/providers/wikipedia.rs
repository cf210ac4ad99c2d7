use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::domain::{CandidateMetadata, CanonicalTitle, ImageCandidate, PlatformId, SourceId};
use crate::error::BoxartError;
use crate::http::Transport;
use crate::providers::html::{self, absolutize};
use crate::providers::{CoverSource, SourceQuery, build_url, get_json, get_text, parse_mismatch};

const ORIGIN: &str = "https://en.wikipedia.org";

static COVERART_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)_coverart\.png$").unwrap());

/// English Wikipedia cover files: browse the Amiga covers category from the title's letter,
/// falling back to a File-namespace search when the category has no match.
#[derive(Clone)]
pub struct WikipediaSource {
    transport: Arc<dyn Transport>,
}

impl WikipediaSource {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    fn category_match(&self, title: &CanonicalTitle) -> Result<Option<String>, BoxartError> {
        let letter = title.first_letter().to_string();
        let url = build_url(
            self.id(),
            &format!("{ORIGIN}/w/index.php"),
            &[],
            &[
                ("title", "Category:Amiga_game_covers"),
                ("from", letter.as_str()),
            ],
        )?;
        let page = get_text(self.transport.as_ref(), self.id(), &url)?;

        Ok(html::select(&page, Some("div"), Some("mw-category-group"))
            .into_iter()
            .flat_map(|group| group.select(Some("a"), None))
            .find_map(|link| {
                let href = link.attr("href")?;
                let name = file_display_name(href);
                let link_title = link.attr("title").unwrap_or_default();
                (title.matches(&name) || title.matches(link_title)).then(|| href.to_string())
            }))
    }

    fn search_match(&self, title: &CanonicalTitle) -> Result<Option<String>, BoxartError> {
        let search = format!("{title} Amiga cover");
        let url = build_url(
            self.id(),
            &format!("{ORIGIN}/w/api.php"),
            &[],
            &[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", search.as_str()),
                ("srnamespace", "6"),
                ("srlimit", "10"),
                ("format", "json"),
            ],
        )?;
        let response = get_json(self.transport.as_ref(), self.id(), &url, &[])?;
        let results = response
            .get("query")
            .and_then(|query| query.get("search"))
            .and_then(Value::as_array)
            .ok_or_else(|| parse_mismatch(self.id(), "search response without results"))?;

        let file = results
            .iter()
            .filter_map(|result| result.get("title").and_then(Value::as_str))
            .find(|name| name.starts_with("File:") && title.matches(name));
        match file {
            Some(name) => {
                let page = name.replace(' ', "_");
                Ok(Some(build_url(self.id(), ORIGIN, &["wiki", page.as_str()], &[])?))
            }
            None => Ok(None),
        }
    }
}

impl CoverSource for WikipediaSource {
    fn id(&self) -> SourceId {
        SourceId::Wikipedia
    }

    fn applies_to(&self, platform: &PlatformId) -> bool {
        platform.is_amiga()
    }

    fn search(&self, query: &SourceQuery) -> Result<Vec<ImageCandidate>, BoxartError> {
        let file_page = match self.category_match(&query.title)? {
            Some(href) => Some(absolutize(ORIGIN, &href)),
            None => {
                query.cancel.check()?;
                self.search_match(&query.title)?
            }
        };
        let Some(file_page) = file_page else {
            return Ok(Vec::new());
        };

        query.cancel.check()?;

        let page = get_text(self.transport.as_ref(), self.id(), &file_page)?;
        let images: Vec<String> = html::select(&page, Some("div"), Some("fullImageLink"))
            .into_iter()
            .filter_map(|block| block.first(Some("a"), None))
            .filter_map(|link| link.attr("href").map(|href| absolutize(ORIGIN, href)))
            .collect();
        if images.is_empty() {
            return Err(parse_mismatch(self.id(), "file page without full image link"));
        }

        Ok(images
            .into_iter()
            .map(|url| {
                ImageCandidate::new(url, self.id()).with_metadata(CandidateMetadata {
                    is_cover_art: Some(true),
                    ..CandidateMetadata::default()
                })
            })
            .collect())
    }
}

/// `/wiki/File:Turrican_II_Coverart.png` reads as `Turrican II`.
fn file_display_name(href: &str) -> String {
    let name = href.replace("/wiki/File:", "");
    COVERART_SUFFIX_RE
        .replace(&name, "")
        .replace('_', " ")
        .to_lowercase()
}
