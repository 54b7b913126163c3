//! Crawler module for page fetching and crawl orchestration
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic
//! - Rendered pages with wait conditions
//! - Per-movie comment pagination
//! - Request scheduling and rate limiting
//! - Overall crawl coordination

mod aggregator;
mod coordinator;
mod fetcher;
mod page;
mod scheduler;

pub use aggregator::{
    AggregationState, CommentAggregator, CommentJob, FinishReason, FinishedMovie, PageOutcome,
    SharedAggregation,
};
pub use coordinator::{build_page_source, run_crawl, Coordinator, CrawlOptions, CrawlProgress};
pub use fetcher::{build_http_client, fetch_url, FetchResult, RetryPolicy};
#[cfg(feature = "browser")]
pub use page::BrowserPageSource;
pub use page::{
    html_satisfies, ElementState, HttpPageSource, PageSource, RenderedPage, WaitCondition,
    WaitError,
};
pub use scheduler::{MovieFrontier, QueuedMovie, Scheduler};

use crate::config::OutputConfig;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Which pages a crawl starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Spider {
    /// The "best movies" ranking listing
    Kinobox,
    /// The site's sitemap, followed recursively
    KinoboxSitemap,
}

impl Spider {
    /// Name used on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Self::Kinobox => "kinobox",
            Self::KinoboxSitemap => "kinobox-sitemap",
        }
    }

    /// Stem used for the job directory and the item feed
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Kinobox => "kinobox",
            Self::KinoboxSitemap => "kinobox_sitemap",
        }
    }

    /// Name of the spider's job directory under the job root
    pub fn job_dir_name(&self) -> String {
        format!("{}_jobdir", self.file_stem())
    }

    /// Built-in start URLs, used when the config lists none
    pub fn default_start_urls(&self) -> Vec<String> {
        match self {
            Self::Kinobox => vec!["https://www.kinobox.cz/zebricky/nejlepsi/filmy".to_string()],
            Self::KinoboxSitemap => vec!["https://www.kinobox.cz/sitemap.xml".to_string()],
        }
    }

    pub fn all() -> [Spider; 2] {
        [Self::Kinobox, Self::KinoboxSitemap]
    }
}

impl fmt::Display for Spider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Spider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kinobox" => Ok(Self::Kinobox),
            "kinobox-sitemap" | "kinobox_sitemap" => Ok(Self::KinoboxSitemap),
            other => Err(format!(
                "Unknown spider: {}. Available spiders: 'kinobox', 'kinobox-sitemap'",
                other
            )),
        }
    }
}

/// Path of a spider's job directory
pub fn job_dir(output: &OutputConfig, spider: Spider) -> PathBuf {
    PathBuf::from(&output.job_root).join(spider.job_dir_name())
}

/// Path of the item feed: `items-path` if set, else `<job-root>/<spider>_items.jsonl`
pub fn items_path(output: &OutputConfig, spider: Spider) -> PathBuf {
    match &output.items_path {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from(&output.job_root).join(format!("{}_items.jsonl", spider.file_stem())),
    }
}
