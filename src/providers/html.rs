//! Just enough HTML walking for the scraped sources: find elements by tag, class or id,
//! read their attributes and flatten their text. Not a parser; it trusts reasonably
//! well-formed markup and falls back to "rest of the document" when a close tag is missing.

use std::sync::LazyLock;

use regex::Regex;

static OPEN_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<([a-zA-Z][a-zA-Z0-9]*)\b([^>]*)>").unwrap());
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .unwrap()
});
static ANY_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

#[derive(Debug, Clone)]
pub struct Element<'a> {
    attrs: Vec<(String, String)>,
    outer: &'a str,
    inner: &'a str,
}

impl<'a> Element<'a> {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|value| value.split_whitespace().any(|item| item == class))
            .unwrap_or(false)
    }

    /// The element including its own tags.
    pub fn outer(&self) -> &'a str {
        self.outer
    }

    pub fn inner(&self) -> &'a str {
        self.inner
    }

    /// Visible text with tags removed, entities decoded and whitespace collapsed.
    pub fn text(&self) -> String {
        let stripped = ANY_TAG_RE.replace_all(self.inner, " ");
        decode_entities(&stripped)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn select(&self, tag: Option<&str>, class: Option<&str>) -> Vec<Element<'a>> {
        select(self.outer, tag, class)
    }

    pub fn first(&self, tag: Option<&str>, class: Option<&str>) -> Option<Element<'a>> {
        self.select(tag, class).into_iter().next()
    }
}

/// Every element matching `tag` and/or `class`, in document order.
pub fn select<'a>(html: &'a str, tag: Option<&str>, class: Option<&str>) -> Vec<Element<'a>> {
    let lower = html.to_ascii_lowercase();
    OPEN_TAG_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            if tag.is_some_and(|tag| !tag.eq_ignore_ascii_case(&name)) {
                return None;
            }
            let raw_attrs = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let element = build_element(html, &lower, &name, raw_attrs, whole.start(), whole.end());
            match class {
                Some(class) if !element.has_class(class) => None,
                _ => Some(element),
            }
        })
        .collect()
}

pub fn first<'a>(html: &'a str, tag: Option<&str>, class: Option<&str>) -> Option<Element<'a>> {
    select(html, tag, class).into_iter().next()
}

pub fn find_by_id<'a>(html: &'a str, id: &str) -> Option<Element<'a>> {
    select(html, None, None)
        .into_iter()
        .find(|element| element.attr("id") == Some(id))
}

/// Resolves `href` against `origin` (scheme and host, no trailing slash).
pub fn absolutize(origin: &str, href: &str) -> String {
    let href = decode_entities(href.trim());
    if href.starts_with("http://") || href.starts_with("https://") {
        href
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if href.starts_with('/') {
        format!("{origin}{href}")
    } else {
        format!("{origin}/{href}")
    }
}

pub fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn build_element<'a>(
    html: &'a str,
    lower: &str,
    name: &str,
    raw_attrs: &str,
    start: usize,
    open_end: usize,
) -> Element<'a> {
    let attrs = ATTR_RE
        .captures_iter(raw_attrs)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| decode_entities(m.as_str()))
                .unwrap_or_default();
            Some((key, value))
        })
        .collect();

    let self_closing = raw_attrs.trim_end().ends_with('/');
    if self_closing || VOID_TAGS.contains(&name) {
        return Element {
            attrs,
            outer: &html[start..open_end],
            inner: "",
        };
    }

    let (inner_end, outer_end) =
        closing_tag(lower, name, open_end).unwrap_or((html.len(), html.len()));
    Element {
        attrs,
        outer: &html[start..outer_end],
        inner: &html[open_end..inner_end],
    }
}

/// Start and end offsets of the close tag balancing an element opened before `from`.
fn closing_tag(lower: &str, name: &str, from: usize) -> Option<(usize, usize)> {
    let open = format!("<{name}");
    let close = format!("</{name}");
    let mut depth = 1usize;
    let mut pos = from;
    loop {
        let next_close = find_tag(lower, &close, pos)?;
        match find_tag(lower, &open, pos) {
            Some(next_open) if next_open < next_close => {
                depth += 1;
                pos = next_open + open.len();
            }
            _ => {
                depth -= 1;
                let end = lower[next_close..]
                    .find('>')
                    .map(|offset| next_close + offset + 1)
                    .unwrap_or(lower.len());
                if depth == 0 {
                    return Some((next_close, end));
                }
                pos = end;
            }
        }
    }
}

fn find_tag(lower: &str, pattern: &str, from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(offset) = lower.get(pos..)?.find(pattern) {
        let found = pos + offset;
        let after = lower[found + pattern.len()..].chars().next();
        if matches!(after, Some(ch) if ch.is_whitespace() || ch == '>' || ch == '/') {
            return Some(found);
        }
        pos = found + pattern.len();
    }
    None
}
