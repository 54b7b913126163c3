//! Storage module for persisting crawl progress
//!
//! Each spider owns a job directory holding `state.db`, which records:
//! - crawl runs and their status, for resumption
//! - every discovered movie and how far it got

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::MovieState;
use crate::CrawlerError;

use std::fs;
use std::path::{Path, PathBuf};

/// File name of the state database inside a job directory
pub const STATE_DB_NAME: &str = "state.db";

/// Initializes or opens the state database of a job directory
///
/// The directory is created if it does not exist.
///
/// # Arguments
///
/// * `job_dir` - The spider's job directory
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(CrawlerError)` - Failed to create the directory or open the database
pub fn open_storage(job_dir: &Path) -> Result<SqliteStorage, CrawlerError> {
    fs::create_dir_all(job_dir)?;
    SqliteStorage::new(&state_db_path(job_dir))
}

/// Path of the state database inside a job directory
pub fn state_db_path(job_dir: &Path) -> PathBuf {
    job_dir.join(STATE_DB_NAME)
}

/// Resets a job directory, preserving hidden entries
///
/// Every entry whose name does not start with `.` is removed. A missing
/// directory is created.
///
/// # Returns
///
/// The number of entries removed
pub fn reset_job_dir(job_dir: &Path) -> std::io::Result<usize> {
    if !job_dir.exists() {
        fs::create_dir_all(job_dir)?;
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(job_dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        removed += 1;
    }

    Ok(removed)
}

/// Represents a movie in the database
#[derive(Debug, Clone)]
pub struct StoredMovie {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub state: MovieState,
    pub comment_pages: u32,
    pub comment_count: u64,
    pub finish_reason: Option<String>,
    pub error_message: Option<String>,
    pub discovered_at: String,
    pub discovered_run: i64,
    pub finished_at: Option<String>,
}

/// Terminal outcome of a movie, written once it leaves the crawl
#[derive(Debug, Clone)]
pub struct MovieOutcome {
    pub state: MovieState,
    pub title: Option<String>,
    pub comment_pages: u32,
    pub comment_count: u64,
    pub finish_reason: Option<String>,
    pub error_message: Option<String>,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub spider: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns true if a run in this status can be resumed
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Running | Self::Interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Interrupted,
            RunStatus::Failed,
        ] {
            let db_str = status.to_db_string();
            let parsed = RunStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_resumable_statuses() {
        assert!(RunStatus::Running.is_resumable());
        assert!(RunStatus::Interrupted.is_resumable());
        assert!(!RunStatus::Completed.is_resumable());
        assert!(!RunStatus::Failed.is_resumable());
    }

    #[test]
    fn test_reset_job_dir_preserves_hidden_entries() {
        let dir = TempDir::new().unwrap();
        let job_dir = dir.path().join("kinobox_jobdir");
        fs::create_dir_all(job_dir.join("requests.queue")).unwrap();
        fs::write(job_dir.join("requests.queue").join("p0"), "x").unwrap();
        fs::write(job_dir.join(STATE_DB_NAME), "x").unwrap();
        fs::write(job_dir.join(".keep"), "").unwrap();
        fs::create_dir_all(job_dir.join(".cache")).unwrap();

        let removed = reset_job_dir(&job_dir).unwrap();

        assert_eq!(removed, 2);
        assert!(!job_dir.join(STATE_DB_NAME).exists());
        assert!(!job_dir.join("requests.queue").exists());
        assert!(job_dir.join(".keep").exists());
        assert!(job_dir.join(".cache").exists());
    }

    #[test]
    fn test_reset_job_dir_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let job_dir = dir.path().join("crawls").join("kinobox_jobdir");

        assert_eq!(reset_job_dir(&job_dir).unwrap(), 0);
        assert!(job_dir.is_dir());
    }

    #[test]
    fn test_open_storage_creates_state_db() {
        let dir = TempDir::new().unwrap();
        let job_dir = dir.path().join("kinobox_jobdir");

        open_storage(&job_dir).unwrap();

        assert!(state_db_path(&job_dir).exists());
    }
}
