//! Item sink traits and types
//!
//! This module defines the trait interface for item sinks and the data
//! structures for crawl summaries.

use crate::model::MovieRecord;
use crate::output::stats::CrawlStatistics;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to serialize item: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Summary of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    // Run metadata
    pub run_id: i64,
    pub spider: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_seconds: Option<u64>,
    pub status: String,
    pub config_hash: String,

    pub statistics: CrawlStatistics,
}

/// Trait for item sinks
///
/// A sink receives every finished movie record exactly once. Implementations
/// must be thread-safe.
pub trait ItemSink: Send + Sync {
    /// Writes one finished movie record
    ///
    /// # Arguments
    ///
    /// * `movie` - The movie with all of its accumulated comments
    fn write_item(&self, movie: &MovieRecord) -> OutputResult<()>;

    /// Flushes buffered items to their destination
    fn flush(&self) -> OutputResult<()>;
}
