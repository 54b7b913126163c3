//! Comments page extraction

use super::{first_text_in, SiteSelectors};
use crate::model::{CommentRecord, RATING_NOT_AVAILABLE};
use crate::url::resolve_link;
use scraper::Html;
use url::Url;

/// Everything taken from one comments page
#[derive(Debug, Clone, Default)]
pub struct CommentsPage {
    /// Comments in document order
    pub comments: Vec<CommentRecord>,
    /// Absolute URL of the next comments page, None on the last page
    pub next_page: Option<Url>,
}

/// Parses a comments page into its comments and next-page link
pub fn parse_comments_page(html: &str, page_url: &Url, selectors: &SiteSelectors) -> CommentsPage {
    let document = Html::parse_document(html);

    CommentsPage {
        comments: extract_comments(&document, selectors),
        next_page: find_next_page(&document, selectors, page_url),
    }
}

/// Extracts all comments on a page, in document order
///
/// Never fails: a comment whose parts are missing still produces a record
/// with `None` fields and an `N/A` rating.
pub fn extract_comments(document: &Html, selectors: &SiteSelectors) -> Vec<CommentRecord> {
    document
        .select(&selectors.comment_item)
        .map(|item| {
            let rating = first_text_in(item, &selectors.comment_rating);

            CommentRecord {
                user: first_text_in(item, &selectors.comment_user),
                published: first_text_in(item, &selectors.comment_published),
                rating: format_rating(rating.as_deref()),
                text: first_text_in(item, &selectors.comment_text),
                likes: first_text_in(item, &selectors.comment_likes),
            }
        })
        .collect()
}

/// Converts the site's 0-10 score into a percentage string
///
/// The score is scaled by ten and truncated: `"7.8"` becomes `"78%"`.
/// Missing, empty or unparsable scores become `"N/A"`.
pub fn format_rating(raw: Option<&str>) -> String {
    let score = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite());

    match score {
        Some(value) => format!("{}%", (value * 10.0).trunc() as i64),
        None => RATING_NOT_AVAILABLE.to_string(),
    }
}

/// Finds the enabled next-page link in the pagination container
///
/// The link is the anchor holding the next-page icon. An anchor with a
/// `disabled` attribute or `aria-disabled="true"` does not count.
pub fn find_next_page(document: &Html, selectors: &SiteSelectors, page_url: &Url) -> Option<Url> {
    document
        .select(&selectors.pagination_container)
        .flat_map(|container| container.select(&selectors.anchor))
        .filter(|anchor| anchor.select(&selectors.pagination_next_icon).next().is_some())
        .find(|anchor| {
            let element = anchor.value();
            element.attr("disabled").is_none() && element.attr("aria-disabled") != Some("true")
        })
        .and_then(|anchor| anchor.value().attr("href"))
        .and_then(|href| resolve_link(href, page_url))
}
