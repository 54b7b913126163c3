//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::MovieState;
use crate::storage::{MovieOutcome, RunRecord, RunStatus, StoredMovie};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Movie not found: {0}")]
    MovieNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("No crawl runs found in the job directory")]
    NoRuns,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all job-directory operations needed by the crawler.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `spider` - Name of the spider being run
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, spider: &str, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Sets the final status of a run together with a finish timestamp
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Movie Management =====

    /// Inserts a newly discovered movie or gets the existing movie ID
    ///
    /// # Arguments
    ///
    /// * `url` - The normalized detail page URL
    /// * `discovered_run` - The run ID that discovered this movie
    ///
    /// # Returns
    ///
    /// The movie ID and whether it was newly inserted
    fn insert_or_get_movie(&mut self, url: &str, discovered_run: i64)
        -> StorageResult<(i64, bool)>;

    /// Gets a movie by ID
    fn get_movie(&self, movie_id: i64) -> StorageResult<StoredMovie>;

    /// Gets a movie by detail URL
    fn get_movie_by_url(&self, url: &str) -> StorageResult<Option<StoredMovie>>;

    /// Moves a movie to an active state, recording its title once known
    fn update_movie_state(
        &mut self,
        movie_id: i64,
        state: MovieState,
        title: Option<&str>,
    ) -> StorageResult<()>;

    /// Records the terminal outcome of a movie
    fn finish_movie(&mut self, movie_id: i64, outcome: &MovieOutcome) -> StorageResult<()>;

    /// Gets all movies in a specific state, oldest first
    fn get_movies_by_state(&self, state: MovieState) -> StorageResult<Vec<StoredMovie>>;

    /// Returns movies left mid-crawl by an interrupted run to `discovered`
    ///
    /// # Returns
    ///
    /// The number of movies that were reset
    fn reset_interrupted_movies(&mut self) -> StorageResult<usize>;

    // ===== Statistics =====

    /// Counts movies by state
    fn count_movies_by_state(&self, state: MovieState) -> StorageResult<u64>;

    /// Gets total movie count
    fn count_total_movies(&self) -> StorageResult<u64>;

    /// Gets the number of comments in all emitted records
    fn count_comments(&self) -> StorageResult<u64>;

    /// Gets finish reason summary (reason -> count)
    fn get_finish_reason_summary(&self) -> StorageResult<HashMap<String, u64>>;
}
