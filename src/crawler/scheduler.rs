//! Scheduler for the movie frontier and request pacing
//!
//! This module handles:
//! - The FIFO frontier of movies waiting to be crawled
//! - Global concurrency limiting of open pages via a semaphore
//! - Respecting the minimum delay between two requests to the site

use crate::config::CrawlerConfig;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use url::Url;

/// A movie queued for crawling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMovie {
    /// Database movie ID
    pub movie_id: i64,

    /// The detail page URL
    pub url: Url,
}

/// Movies waiting to be crawled, in discovery order
#[derive(Debug, Default)]
pub struct MovieFrontier {
    queue: VecDeque<QueuedMovie>,
    seen: HashSet<i64>,
}

impl MovieFrontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a movie unless it was queued before
    ///
    /// # Returns
    ///
    /// true if the movie was added
    pub fn push(&mut self, movie: QueuedMovie) -> bool {
        if !self.seen.insert(movie.movie_id) {
            return false;
        }
        self.queue.push_back(movie);
        true
    }

    pub fn pop(&mut self) -> Option<QueuedMovie> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl FromIterator<QueuedMovie> for MovieFrontier {
    fn from_iter<I: IntoIterator<Item = QueuedMovie>>(iter: I) -> Self {
        let mut frontier = Self::new();
        for movie in iter {
            frontier.push(movie);
        }
        frontier
    }
}

/// Scheduler gates every page open
///
/// The scheduler coordinates:
/// - Global concurrency limits (max concurrent pages open)
/// - Global request spacing (minimum time between requests)
pub struct Scheduler {
    /// Global semaphore for limiting concurrently open pages
    global_semaphore: Arc<Semaphore>,

    /// When the last request was let through
    last_request: Mutex<Option<Instant>>,

    /// Minimum time between two requests
    spacing: Duration,
}

impl Scheduler {
    /// Creates a new scheduler from the crawler configuration
    pub fn new(config: &CrawlerConfig) -> Self {
        Self::with_limits(
            config.max_concurrent_pages_open as usize,
            config.request_spacing(),
        )
    }

    /// Creates a scheduler with explicit limits
    ///
    /// # Arguments
    ///
    /// * `max_pages_open` - Pages that may be open at the same time
    /// * `spacing` - Minimum time between two requests
    pub fn with_limits(max_pages_open: usize, spacing: Duration) -> Self {
        Self {
            global_semaphore: Arc::new(Semaphore::new(max_pages_open)),
            last_request: Mutex::new(None),
            spacing,
        }
    }

    /// Waits until a page may be opened
    ///
    /// This method:
    /// 1. Acquires a global semaphore permit
    /// 2. Waits until the minimum spacing since the previous request has passed
    ///
    /// The permit must be held until the page is closed.
    ///
    /// # Returns
    ///
    /// * `Some(OwnedSemaphorePermit)` - The page may be opened
    /// * `None` - The scheduler was closed
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        let permit = self.global_semaphore.clone().acquire_owned().await.ok()?;

        let mut last_request = self.last_request.lock().await;
        if let Some(last) = *last_request {
            let ready_at = last + self.spacing;
            let now = Instant::now();
            if ready_at > now {
                tracing::trace!("Spacing requests, waiting {:?}", ready_at - now);
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last_request = Some(Instant::now());

        Some(permit)
    }

    /// Stops handing out permits; pending and future `acquire` calls return None
    pub fn close(&self) {
        self.global_semaphore.close();
    }

    /// Returns the number of pages that can be opened right now
    pub fn available_permits(&self) -> usize {
        self.global_semaphore.available_permits()
    }
}
