//! Compiled CSS selectors for the site's markup

use crate::config::SelectorConfig;
use crate::ConfigError;
use scraper::Selector;

/// All selectors used by the extractors, compiled once per crawl
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    pub ranking_link: Selector,

    pub movie_title: Selector,
    pub movie_title_eng: Selector,
    pub movie_year: Selector,
    pub movie_duration: Selector,
    pub movie_rating: Selector,
    pub movie_description: Selector,
    pub movie_actors: Selector,
    pub movie_roles: Selector,

    pub comments_nav_link: Selector,
    pub comments_nav_icon: Selector,
    pub comments_nav_fallback: Selector,

    pub comment_item: Selector,
    pub comment_user: Selector,
    pub comment_published: Selector,
    pub comment_rating: Selector,
    pub comment_text: Selector,
    pub comment_likes: Selector,

    pub pagination_container: Selector,
    pub pagination_next_icon: Selector,
    pub anchor: Selector,

    source: SelectorConfig,
}

fn parse(name: &str, css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|e| ConfigError::InvalidSelector {
        name: name.to_string(),
        message: e.to_string(),
    })
}

impl SiteSelectors {
    /// Compiles every configured selector
    ///
    /// # Returns
    ///
    /// * `Ok(SiteSelectors)` - All selectors parsed
    /// * `Err(ConfigError::InvalidSelector)` - The first selector that failed to parse
    pub fn compile(config: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            ranking_link: parse("ranking-link", &config.ranking_link)?,

            movie_title: parse("movie-title", &config.movie_title)?,
            movie_title_eng: parse("movie-title-eng", &config.movie_title_eng)?,
            movie_year: parse("movie-year", &config.movie_year)?,
            movie_duration: parse("movie-duration", &config.movie_duration)?,
            movie_rating: parse("movie-rating", &config.movie_rating)?,
            movie_description: parse("movie-description", &config.movie_description)?,
            movie_actors: parse("movie-actors", &config.movie_actors)?,
            movie_roles: parse("movie-roles", &config.movie_roles)?,

            comments_nav_link: parse("comments-nav-link", &config.comments_nav_link)?,
            comments_nav_icon: parse("comments-nav-icon", &config.comments_nav_icon)?,
            comments_nav_fallback: parse("comments-nav-fallback", &config.comments_nav_fallback)?,

            comment_item: parse("comment-item", &config.comment_item)?,
            comment_user: parse("comment-user", &config.comment_user)?,
            comment_published: parse("comment-published", &config.comment_published)?,
            comment_rating: parse("comment-rating", &config.comment_rating)?,
            comment_text: parse("comment-text", &config.comment_text)?,
            comment_likes: parse("comment-likes", &config.comment_likes)?,

            pagination_container: parse("pagination-container", &config.pagination_container)?,
            pagination_next_icon: parse("pagination-next-icon", &config.pagination_next_icon)?,
            anchor: parse("anchor", "a[href]")?,

            source: config.clone(),
        })
    }

    /// CSS of the comment list item, used as a page wait condition
    pub fn comment_item_css(&self) -> &str {
        &self.source.comment_item
    }

    /// CSS of the pagination container, used as a page wait condition
    pub fn pagination_container_css(&self) -> &str {
        &self.source.pagination_container
    }
}
