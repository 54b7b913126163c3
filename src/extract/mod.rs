//! Page extractors for the site's markup
//!
//! All extractors are pure functions over a parsed document:
//! - `movie`: detail page → movie metadata and the comments-page link
//! - `comments`: comments page → ordered comments and the next-page link
//! - `listing`: ranking listing → movie detail links
//! - `sitemap`: sitemap XML → page or child-sitemap URLs
//!
//! A selector that matches nothing yields an absent value, never an error.

mod comments;
mod listing;
mod movie;
mod selectors;
mod sitemap;

pub use comments::{
    extract_comments, find_next_page, format_rating, parse_comments_page, CommentsPage,
};
pub use listing::extract_movie_links;
pub use movie::{assign_roles, extract_movie, find_comments_link, parse_detail_page, DetailPage};
pub use selectors::SiteSelectors;
pub use sitemap::{matches_rule, parse_sitemap, Sitemap};

use scraper::{ElementRef, Html, Selector};

/// Collapses whitespace runs and trims, like XPath `normalize-space`
pub fn normalize_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized text content of an element, None when it is blank
pub fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = normalize_space(&element.text().collect::<String>());
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Text of the first document match of `selector`
pub fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().and_then(element_text)
}

/// Text of the first match of `selector` below `element`
pub fn first_text_in(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element.select(selector).next().and_then(element_text)
}
