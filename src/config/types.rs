use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub pagination: PaginationConfig,
    pub fetch: FetchConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    pub control: ControlConfig,
    pub selectors: SelectorConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Overrides the spider's built-in start URLs when non-empty
    pub start_urls: Vec<String>,

    /// Maximum number of movies processed at the same time
    pub max_concurrent_movies: u32,

    /// Maximum number of pages open (in flight) at the same time
    pub max_concurrent_pages_open: u32,

    /// Minimum time between two requests to the site (milliseconds)
    pub minimum_time_between_requests: u64,

    /// How many times a retryable response is retried
    pub retry_times: u32,

    /// HTTP status codes treated as transient
    pub retry_http_codes: Vec<u16>,

    /// Base delay between retries (milliseconds), multiplied by the attempt number
    pub retry_delay: u64,

    /// Request timeout (seconds)
    pub request_timeout: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_urls: Vec::new(),
            max_concurrent_movies: 8,
            max_concurrent_pages_open: 16,
            minimum_time_between_requests: 250,
            retry_times: 5,
            retry_http_codes: vec![429],
            retry_delay: 1000,
            request_timeout: 30,
        }
    }
}

impl CrawlerConfig {
    pub fn request_spacing(&self) -> Duration {
        Duration::from_millis(self.minimum_time_between_requests)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Comment pagination configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PaginationConfig {
    /// How long to wait for the comment list and pagination to appear (milliseconds)
    pub wait_timeout: u64,

    /// How often a pending wait condition is re-checked (milliseconds)
    pub poll_interval: u64,

    /// Drop a movie's accumulated comments once its record is emitted
    pub prune_completed: bool,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            wait_timeout: 30_000,
            poll_interval: 500,
            prune_completed: true,
        }
    }
}

impl PaginationConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval)
    }
}

/// How pages are rendered before extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Renderer {
    /// Plain HTTP GET of the server-rendered HTML
    #[default]
    Http,
    /// Headless Chromium (requires the `browser` feature)
    Browser,
}

/// Page fetching configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchConfig {
    pub renderer: Renderer,

    /// Run Chromium without a window
    pub headless: bool,

    /// Explicit Chromium executable; autodetected when unset
    pub chrome_executable: Option<String>,

    /// URL patterns a browser tab never loads (`*` wildcards); empty loads everything
    pub block_resources: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            renderer: Renderer::Http,
            headless: true,
            chrome_executable: None,
            block_resources: default_blocked_resources(),
        }
    }
}

/// Images, fonts and media: never needed to read the page text
fn default_blocked_resources() -> Vec<String> {
    [
        "*.jpg", "*.jpeg", "*.png", "*.gif", "*.webp", "*.svg", "*.ico", "*.woff", "*.woff2",
        "*.ttf", "*.otf", "*.mp4", "*.webm", "*.mp3",
    ]
    .iter()
    .map(|pattern| pattern.to_string())
    .collect()
}

/// User agent configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Full User-Agent header value
    pub value: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            value: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory holding one job directory per spider
    pub job_root: String,

    /// JSON-lines file receiving finished movie records.
    /// Defaults to `<job-root>/<spider>_items.jsonl`.
    pub items_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            job_root: "crawls".to_string(),
            items_path: None,
        }
    }
}

/// Local control channel configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ControlConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 6025,
            username: "scrapy".to_string(),
            password: "1111".to_string(),
        }
    }
}

impl ControlConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// CSS selectors for the site's markup
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SelectorConfig {
    pub ranking_link: String,

    pub movie_title: String,
    pub movie_title_eng: String,
    pub movie_year: String,
    pub movie_duration: String,
    pub movie_rating: String,
    pub movie_description: String,
    pub movie_actors: String,
    pub movie_roles: String,

    /// Navigation anchors that may lead to the comments page
    pub comments_nav_link: String,
    /// Icon marking the comments anchor among `comments-nav-link` matches
    pub comments_nav_icon: String,
    /// Anchor used when no navigation anchor carries the comments icon
    pub comments_nav_fallback: String,

    pub comment_item: String,
    pub comment_user: String,
    pub comment_published: String,
    pub comment_rating: String,
    pub comment_text: String,
    pub comment_likes: String,

    pub pagination_container: String,
    pub pagination_next_icon: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            ranking_link: r#"main li div.FilmRankingItemExtended_metaRowWrapper__r3NGx a[data-context="title"]"#.to_string(),

            movie_title: "h1".to_string(),
            movie_title_eng: "div.FilmLayout_metadata__7nnz4 > h2".to_string(),
            movie_year: "div.FilmLayout_metadata__7nnz4 p.FilmLayout_yearLabel__MYmp_".to_string(),
            movie_duration: "div.FilmLayout_metadata__7nnz4 span:nth-of-type(2)".to_string(),
            movie_rating: "aside div.Score_container__eAKcX.FilmLayout_score__2JrHf > div".to_string(),
            movie_description: "main > div.FilmPageOverviewContainer_summary__DJLug".to_string(),
            movie_actors: "section > div > div > a.CastItem_container__hzzP4 h4".to_string(),
            movie_roles: "section div.FilmPageOverviewContainer_castInfo__aPQjG a".to_string(),

            comments_nav_link: r#"ul[role="list"] > li a[href]"#.to_string(),
            comments_nav_icon: r#"i[title="Komentáře"]"#.to_string(),
            comments_nav_fallback: r#"ul[role="list"] > li:nth-child(4) > a[href]"#.to_string(),

            comment_item: "article.UserRatingItem_container__HudHI".to_string(),
            comment_user: "header > div > a".to_string(),
            comment_published: "header time".to_string(),
            comment_rating: "header > div.UserRatingItem_score__kgilY".to_string(),
            comment_text: "div.UserRatingItem_ratingContent__i_LV0".to_string(),
            comment_likes: "footer div".to_string(),

            pagination_container: ".Pagination_container__PMgYg".to_string(),
            pagination_next_icon: "i.Pagination_nextIcon__H_WMv".to_string(),
        }
    }
}
