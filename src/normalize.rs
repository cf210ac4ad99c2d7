//! Title normalization shared by searching and cache addressing.

/// Returned for titles that normalize to nothing.
pub const FALLBACK_TITLE: &str = "untitled";

const MAX_EXTENSION_LEN: usize = 8;

/// Turns a raw filename or title into its canonical form.
///
/// Directory components and a trailing file extension are dropped, `_`, `.` and `-` become
/// spaces, anything that is not a letter, digit or space is removed and whitespace is
/// collapsed. The result never contains a separator, so normalizing twice changes nothing.
pub fn normalize(raw: &str) -> String {
    let file_name = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let stem = strip_extension(file_name);

    let cleaned: String = stem
        .chars()
        .map(|ch| match ch {
            '_' | '.' | '-' => ' ',
            ch if ch.is_alphanumeric() || ch.is_whitespace() => ch,
            _ => ' ',
        })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        collapsed
    }
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.trim().is_empty()
                && !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|ch| ch.is_ascii_alphanumeric()) =>
        {
            stem
        }
        _ => name,
    }
}
