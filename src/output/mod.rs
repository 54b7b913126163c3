//! Output module for emitted items and crawl summaries
//!
//! This module handles:
//! - Writing finished movie records to an item sink (JSON lines, memory)
//! - Recording crawl statistics and summaries from the job directory

mod jsonl;
mod memory;
pub mod stats;
mod traits;

pub use jsonl::JsonLinesSink;
pub use memory::MemorySink;
pub use stats::{load_statistics, print_statistics, print_summary, CrawlStatistics};
pub use traits::{CrawlSummary, ItemSink, OutputError, OutputResult};

use crate::storage::{Storage, StorageError};
use crate::CrawlerError;

/// Generates a summary of the latest run from storage
///
/// # Arguments
///
/// * `storage` - The storage backend containing crawl data
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - Successfully generated summary
/// * `Err(CrawlerError)` - No run recorded yet, or the query failed
pub fn generate_summary(storage: &dyn Storage) -> Result<CrawlSummary, CrawlerError> {
    let run = storage
        .get_latest_run()?
        .ok_or(StorageError::NoRuns)?;

    let duration_seconds = if let (Ok(started), Some(finished_str)) = (
        run.started_at.parse::<chrono::DateTime<chrono::Utc>>(),
        &run.finished_at,
    ) {
        finished_str
            .parse::<chrono::DateTime<chrono::Utc>>()
            .ok()
            .map(|finished| (finished - started).num_seconds().max(0) as u64)
    } else {
        None
    };

    let statistics = stats::load_statistics(storage)?;

    Ok(CrawlSummary {
        run_id: run.id,
        spider: run.spider,
        started_at: run.started_at,
        finished_at: run.finished_at,
        duration_seconds,
        status: run.status.to_db_string().to_string(),
        config_hash: run.config_hash,
        statistics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RunStatus, SqliteStorage};

    #[test]
    fn test_generate_summary_without_runs() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(generate_summary(&storage).is_err());
    }

    #[test]
    fn test_generate_summary_latest_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.create_run("kinobox", "old").unwrap();
        let run_id = storage.create_run("kinobox", "new").unwrap();
        storage.finish_run(run_id, RunStatus::Completed).unwrap();

        let summary = generate_summary(&storage).unwrap();

        assert_eq!(summary.run_id, run_id);
        assert_eq!(summary.status, "completed");
        assert_eq!(summary.config_hash, "new");
        assert!(summary.duration_seconds.is_some());
        assert_eq!(summary.statistics.total_movies, 0);
    }
}
