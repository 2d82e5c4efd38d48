//! Heuristics for spotting image links in catalog cells.
//!
//! Marketplace templates are filled in by hand, so links show up with and
//! without a scheme, wrapped in quotes, or as bare CDN hostnames. Everything
//! here is plain pattern matching; nothing touches the network.

use lazy_static::lazy_static;
use regex::Regex;

/// Scheme prepended to links that were typed without one.
pub const DEFAULT_SCHEME: &str = "https://";

lazy_static! {
    static ref HTTP_URL_RE: Regex =
        Regex::new(r"(?i)^(https?://)?([A-Za-z0-9.\-]+\.[A-Za-z]{2,})(/.*)$").unwrap();
    static ref LIKELY_CDN_RE: Regex = Regex::new(r"(?i)^(cdn\.|media\.|images\.|static\.)").unwrap();
}

fn has_http_scheme(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Check whether a cell value looks like a link worth previewing
///
/// # Arguments
/// * `s` - Raw cell text
///
/// # Returns
/// * `bool` - True for schemed links, `host.tld/path` strings and bare CDN hosts
///
/// # Examples
/// ```
/// use image_opening::url::is_url_like;
///
/// assert!(is_url_like("https://example.com/a.jpg"));
/// assert!(is_url_like("cdn.shop.com/p/1.png"));
/// assert!(!is_url_like("Blue cotton shirt"));
/// ```
pub fn is_url_like(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() {
        return false;
    }
    has_http_scheme(s) || HTTP_URL_RE.is_match(s) || LIKELY_CDN_RE.is_match(s)
}

/// Turn a URL-like cell value into a fetchable absolute URL
///
/// Surrounding whitespace and quotes are removed. Links without a scheme get
/// [`DEFAULT_SCHEME`].
///
/// # Arguments
/// * `s` - Raw cell text
///
/// # Returns
/// * `Option<String>` - The absolute URL, or `None` when the text is not URL-like
///
/// # Examples
/// ```
/// use image_opening::url::normalize_url;
///
/// assert_eq!(
///     normalize_url("'example.com/a.jpg'").as_deref(),
///     Some("https://example.com/a.jpg")
/// );
/// assert_eq!(normalize_url("not a link"), None);
/// ```
pub fn normalize_url(s: &str) -> Option<String> {
    let s = s.trim().trim_matches('"').trim_matches('\'');
    if s.is_empty() {
        return None;
    }
    if has_http_scheme(s) {
        return Some(s.to_string());
    }
    if let Some(caps) = HTTP_URL_RE.captures(s) {
        let scheme = caps.get(1).map_or(DEFAULT_SCHEME, |m| m.as_str());
        return Some(format!("{}{}{}", scheme, &caps[2], &caps[3]));
    }
    if LIKELY_CDN_RE.is_match(s) {
        return Some(match s.split_once('/') {
            Some((host, path)) => format!("{}{}/{}", DEFAULT_SCHEME, host, path),
            None => format!("{}{}", DEFAULT_SCHEME, s),
        });
    }
    None
}

/// Normalised URL, or the trimmed original text when normalisation fails.
pub fn resolve_url(s: &str) -> String {
    normalize_url(s).unwrap_or_else(|| s.trim().to_string())
}
