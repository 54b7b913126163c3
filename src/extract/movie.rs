//! Movie detail page extraction

use super::{element_text, first_text, SiteSelectors};
use crate::model::MovieRecord;
use crate::url::resolve_link;
use scraper::Html;
use url::Url;

/// Everything taken from one movie detail page
#[derive(Debug, Clone)]
pub struct DetailPage {
    pub movie: MovieRecord,
    /// Absolute URL of the movie's first comments page, if the page links one
    pub comments_url: Option<Url>,
}

/// Parses a detail page and extracts the movie and its comments link
///
/// The parsed document is dropped before returning, so the result can be held
/// across await points.
pub fn parse_detail_page(html: &str, page_url: &Url, selectors: &SiteSelectors) -> DetailPage {
    let document = Html::parse_document(html);

    DetailPage {
        movie: extract_movie(&document, selectors),
        comments_url: find_comments_link(&document, selectors, page_url),
    }
}

/// Extracts movie metadata from a detail page
///
/// # Arguments
///
/// * `document` - The parsed detail page
/// * `selectors` - Compiled site selectors
///
/// # Returns
///
/// A `MovieRecord` with an empty comment list. Fields whose selector matches
/// nothing (or only whitespace) are `None`.
pub fn extract_movie(document: &Html, selectors: &SiteSelectors) -> MovieRecord {
    let main_actors: Vec<String> = document
        .select(&selectors.movie_actors)
        .filter_map(element_text)
        .collect();

    let roles: Vec<String> = document
        .select(&selectors.movie_roles)
        .filter_map(element_text)
        .collect();
    let (director, screenwriter, music) = assign_roles(&roles);

    MovieRecord {
        title: first_text(document, &selectors.movie_title),
        title_eng: first_text(document, &selectors.movie_title_eng),
        year: first_text(document, &selectors.movie_year),
        duration: first_text(document, &selectors.movie_duration),
        rating: first_text(document, &selectors.movie_rating),
        description: first_text(document, &selectors.movie_description),
        main_actors,
        director,
        screenwriter,
        music,
        comments: Vec::new(),
    }
}

/// Assigns crew roles by position: director, screenwriter, music
///
/// Missing positions are `None`; extra entries are ignored.
pub fn assign_roles(roles: &[String]) -> (Option<String>, Option<String>, Option<String>) {
    let role = |index: usize| roles.get(index).cloned();
    (role(0), role(1), role(2))
}

/// Finds the link to the movie's comments page
///
/// Prefers the navigation anchor carrying the comments icon and falls back to
/// the fixed navigation position. The href is resolved against `page_url`.
pub fn find_comments_link(document: &Html, selectors: &SiteSelectors, page_url: &Url) -> Option<Url> {
    let by_icon = document
        .select(&selectors.comments_nav_link)
        .find(|anchor| anchor.select(&selectors.comments_nav_icon).next().is_some());

    let anchor = by_icon.or_else(|| document.select(&selectors.comments_nav_fallback).next())?;
    let href = anchor.value().attr("href")?;

    resolve_link(href, page_url)
}
