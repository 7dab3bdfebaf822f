//! URL handling for the crawler
//!
//! Frontier deduplication keys off normalized URLs, and the page parser needs
//! to turn `href` attributes into absolute, fetchable URLs.

mod normalize;

pub use normalize::normalize_url;

use url::Url;

/// Resolves a link href against a page URL
///
/// Returns `None` for links the crawler never follows:
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - fragment-only anchors
/// - anything that is not HTTP(S) after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(absolute),
        _ => None,
    }
}

/// Returns the lowercase host of a URL, used as the politeness key
pub fn host_of(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the last path segment of a URL, if any
pub fn file_name_of(url: &Url) -> Option<&str> {
    url.path_segments()?
        .next_back()
        .filter(|segment| !segment.is_empty())
}
