//! URL handling for the crawler
//!
//! Resolving links found on pages, normalizing movie URLs into stable
//! de-duplication keys, and keeping the crawl on the site it started from.

mod normalize;

pub use normalize::normalize_url;

use url::Url;

/// Resolves a link href against the page it was found on
///
/// Returns None if the link should not be followed:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only anchors
/// - invalid URLs or non-HTTP(S) URLs after resolution
///
/// # Examples
///
/// ```
/// use kinobox_crawler::url::resolve_link;
/// use url::Url;
///
/// let base = Url::parse("https://www.kinobox.cz/film/1-pelisky").unwrap();
/// let url = resolve_link("/film/1-pelisky/komentare", &base).unwrap();
/// assert_eq!(url.as_str(), "https://www.kinobox.cz/film/1-pelisky/komentare");
/// ```
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url),
        _ => None,
    }
}

/// Strips a leading `www.` so that `www.kinobox.cz` and `kinobox.cz` compare equal
fn site_host(url: &Url) -> Option<String> {
    url.host_str().map(|host| {
        let host = host.to_lowercase();
        host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
    })
}

/// Returns true if both URLs point at the same site (host and port)
pub fn is_same_site(url: &Url, reference: &Url) -> bool {
    site_host(url).is_some()
        && site_host(url) == site_host(reference)
        && url.port_or_known_default() == reference.port_or_known_default()
}
