//! Ranking listing extraction

use super::SiteSelectors;
use crate::url::{normalize_url, resolve_link};
use scraper::Html;
use std::collections::HashSet;
use url::Url;

/// Extracts movie detail links from a ranking listing page
///
/// Links are resolved against `page_url` and returned in document order with
/// duplicates (by normalized URL) removed.
pub fn extract_movie_links(html: &str, page_url: &Url, selectors: &SiteSelectors) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();

    document
        .select(&selectors.ranking_link)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| resolve_link(href, page_url))
        .filter(|url| {
            let key = normalize_url(url.as_str())
                .map(|u| u.to_string())
                .unwrap_or_else(|_| url.to_string());
            seen.insert(key)
        })
        .collect()
}
