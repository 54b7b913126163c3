//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::MovieState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{MovieOutcome, RunRecord, RunStatus, StoredMovie};
use crate::CrawlerError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const MOVIE_COLUMNS: &str = "id, url, title, state, comment_pages, comment_count, finish_reason,
     error_message, discovered_at, discovered_run, finished_at";

const RUN_COLUMNS: &str = "id, spider, started_at, finished_at, config_hash, status";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(CrawlerError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, CrawlerError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, CrawlerError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        spider: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Running),
    })
}

fn movie_from_row(row: &Row<'_>) -> rusqlite::Result<StoredMovie> {
    Ok(StoredMovie {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        state: MovieState::from_db_string(&row.get::<_, String>(3)?).unwrap_or(MovieState::Failed),
        comment_pages: row.get(4)?,
        comment_count: row.get(5)?,
        finish_reason: row.get(6)?,
        error_message: row.get(7)?,
        discovered_at: row.get(8)?,
        discovered_run: row.get(9)?,
        finished_at: row.get(10)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, spider: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (spider, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![spider, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .map_err(|_| StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        Ok(())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        Ok(())
    }

    // ===== Movie Management =====

    fn insert_or_get_movie(
        &mut self,
        url: &str,
        discovered_run: i64,
    ) -> StorageResult<(i64, bool)> {
        let existing: Option<i64> = self
            .conn
            .query_row("SELECT id FROM movies WHERE url = ?1", params![url], |row| {
                row.get(0)
            })
            .optional()?;

        if let Some(id) = existing {
            return Ok((id, false));
        }

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO movies (url, state, discovered_at, discovered_run) VALUES (?1, ?2, ?3, ?4)",
            params![url, MovieState::Discovered.to_db_string(), now, discovered_run],
        )?;

        Ok((self.conn.last_insert_rowid(), true))
    }

    fn get_movie(&self, movie_id: i64) -> StorageResult<StoredMovie> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM movies WHERE id = ?1", MOVIE_COLUMNS),
                params![movie_id],
                movie_from_row,
            )
            .map_err(|_| StorageError::MovieNotFound(format!("Movie ID {}", movie_id)))
    }

    fn get_movie_by_url(&self, url: &str) -> StorageResult<Option<StoredMovie>> {
        let movie = self
            .conn
            .query_row(
                &format!("SELECT {} FROM movies WHERE url = ?1", MOVIE_COLUMNS),
                params![url],
                movie_from_row,
            )
            .optional()?;

        Ok(movie)
    }

    fn update_movie_state(
        &mut self,
        movie_id: i64,
        state: MovieState,
        title: Option<&str>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE movies SET state = ?1, title = COALESCE(?2, title) WHERE id = ?3",
            params![state.to_db_string(), title, movie_id],
        )?;
        Ok(())
    }

    fn finish_movie(&mut self, movie_id: i64, outcome: &MovieOutcome) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE movies SET state = ?1, title = COALESCE(?2, title), comment_pages = ?3,
             comment_count = ?4, finish_reason = ?5, error_message = ?6, finished_at = ?7
             WHERE id = ?8",
            params![
                outcome.state.to_db_string(),
                outcome.title,
                outcome.comment_pages,
                outcome.comment_count,
                outcome.finish_reason,
                outcome.error_message,
                now,
                movie_id
            ],
        )?;
        Ok(())
    }

    fn get_movies_by_state(&self, state: MovieState) -> StorageResult<Vec<StoredMovie>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM movies WHERE state = ?1 ORDER BY id",
            MOVIE_COLUMNS
        ))?;

        let movies = stmt
            .query_map(params![state.to_db_string()], movie_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(movies)
    }

    fn reset_interrupted_movies(&mut self) -> StorageResult<usize> {
        let reset = self.conn.execute(
            "UPDATE movies SET state = ?1 WHERE state IN (?2, ?3)",
            params![
                MovieState::Discovered.to_db_string(),
                MovieState::Fetching.to_db_string(),
                MovieState::Paginating.to_db_string()
            ],
        )?;
        Ok(reset)
    }

    // ===== Statistics =====

    fn count_movies_by_state(&self, state: MovieState) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM movies WHERE state = ?1",
            params![state.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total_movies(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM movies", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_comments(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(comment_count), 0) FROM movies WHERE state IN (?1, ?2)",
            params![
                MovieState::Completed.to_db_string(),
                MovieState::Partial.to_db_string()
            ],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_finish_reason_summary(&self) -> StorageResult<HashMap<String, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT finish_reason, COUNT(*) FROM movies
             WHERE finish_reason IS NOT NULL GROUP BY finish_reason",
        )?;

        let summary = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(state: MovieState, comments: u64, reason: Option<&str>) -> MovieOutcome {
        MovieOutcome {
            state,
            title: Some("Pelíšky".to_string()),
            comment_pages: 2,
            comment_count: comments,
            finish_reason: reason.map(str::to_string),
            error_message: None,
        }
    }

    #[test]
    fn test_create_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("kinobox", "test_hash").unwrap();
        assert!(run_id > 0);

        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.spider, "kinobox");
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());
    }

    #[test]
    fn test_get_run_missing() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.get_run(42),
            Err(StorageError::RunNotFound(42))
        ));
    }

    #[test]
    fn test_latest_run_and_finish() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.get_latest_run().unwrap().is_none());

        let first = storage.create_run("kinobox", "a").unwrap();
        let second = storage.create_run("kinobox", "b").unwrap();
        storage.finish_run(second, RunStatus::Interrupted).unwrap();

        let latest = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(latest.id, second);
        assert_ne!(latest.id, first);
        assert_eq!(latest.status, RunStatus::Interrupted);
        assert!(latest.finished_at.is_some());
    }

    #[test]
    fn test_insert_duplicate_movie() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("kinobox", "hash").unwrap();

        let (id1, new1) = storage
            .insert_or_get_movie("https://www.kinobox.cz/film/1-pelisky", run_id)
            .unwrap();
        let (id2, new2) = storage
            .insert_or_get_movie("https://www.kinobox.cz/film/1-pelisky", run_id)
            .unwrap();

        assert_eq!(id1, id2);
        assert!(new1);
        assert!(!new2);
        assert_eq!(storage.get_movie(id1).unwrap().state, MovieState::Discovered);
    }

    #[test]
    fn test_movie_lifecycle() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("kinobox", "hash").unwrap();
        let url = "https://www.kinobox.cz/film/1-pelisky";
        let (id, _) = storage.insert_or_get_movie(url, run_id).unwrap();

        storage
            .update_movie_state(id, MovieState::Paginating, Some("Pelíšky"))
            .unwrap();
        storage.update_movie_state(id, MovieState::Paginating, None).unwrap();
        assert_eq!(
            storage.get_movie(id).unwrap().title.as_deref(),
            Some("Pelíšky")
        );

        storage
            .finish_movie(id, &outcome(MovieState::Completed, 5, Some("last_page")))
            .unwrap();

        let movie = storage.get_movie_by_url(url).unwrap().unwrap();
        assert_eq!(movie.state, MovieState::Completed);
        assert_eq!(movie.comment_pages, 2);
        assert_eq!(movie.comment_count, 5);
        assert_eq!(movie.finish_reason.as_deref(), Some("last_page"));
        assert!(movie.finished_at.is_some());
    }

    #[test]
    fn test_reset_interrupted_movies() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("kinobox", "hash").unwrap();
        let (a, _) = storage.insert_or_get_movie("https://x/film/a", run_id).unwrap();
        let (b, _) = storage.insert_or_get_movie("https://x/film/b", run_id).unwrap();
        let (c, _) = storage.insert_or_get_movie("https://x/film/c", run_id).unwrap();

        storage.update_movie_state(a, MovieState::Fetching, None).unwrap();
        storage.update_movie_state(b, MovieState::Paginating, None).unwrap();
        storage
            .finish_movie(c, &outcome(MovieState::Completed, 1, Some("last_page")))
            .unwrap();

        assert_eq!(storage.reset_interrupted_movies().unwrap(), 2);

        let discovered = storage.get_movies_by_state(MovieState::Discovered).unwrap();
        assert_eq!(
            discovered.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![a, b]
        );
        assert_eq!(storage.get_movie(c).unwrap().state, MovieState::Completed);
    }

    #[test]
    fn test_statistics() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("kinobox", "hash").unwrap();
        let (a, _) = storage.insert_or_get_movie("https://x/film/a", run_id).unwrap();
        let (b, _) = storage.insert_or_get_movie("https://x/film/b", run_id).unwrap();
        let (c, _) = storage.insert_or_get_movie("https://x/film/c", run_id).unwrap();
        storage.insert_or_get_movie("https://x/film/d", run_id).unwrap();

        storage
            .finish_movie(a, &outcome(MovieState::Completed, 5, Some("last_page")))
            .unwrap();
        storage
            .finish_movie(
                b,
                &outcome(MovieState::Partial, 3, Some("pagination_timeout")),
            )
            .unwrap();
        storage
            .finish_movie(
                c,
                &MovieOutcome {
                    error_message: Some("HTTP 404".to_string()),
                    ..outcome(MovieState::Failed, 0, None)
                },
            )
            .unwrap();

        assert_eq!(storage.count_total_movies().unwrap(), 4);
        assert_eq!(
            storage.count_movies_by_state(MovieState::Discovered).unwrap(),
            1
        );
        assert_eq!(storage.count_comments().unwrap(), 8);

        let reasons = storage.get_finish_reason_summary().unwrap();
        assert_eq!(reasons.get("last_page"), Some(&1));
        assert_eq!(reasons.get("pagination_timeout"), Some(&1));
        assert_eq!(reasons.len(), 2);
    }
}
