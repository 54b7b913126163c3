//! Per-movie comment pagination
//!
//! A movie's comments are spread over a chain of pages. The aggregator follows
//! the chain strictly in order, appends every page's comments to the movie's
//! entry in the shared `AggregationState`, and emits the movie exactly once:
//! - after the last page (no enabled next-page link)
//! - after a page whose wait conditions failed, with whatever that page shows
//! - after a later page could not be fetched, with what was accumulated
//!
//! The lock on the shared state is never held across an `.await`, and parsed
//! documents never outlive the synchronous `absorb` step.

use crate::config::PaginationConfig;
use crate::crawler::page::{PageSource, RenderedPage, WaitCondition};
use crate::crawler::scheduler::Scheduler;
use crate::extract::{parse_comments_page, SiteSelectors};
use crate::model::{CommentRecord, MovieKey, MovieRecord};
use crate::CrawlerError;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Comments accumulated per movie during one crawl run
#[derive(Debug, Default)]
pub struct AggregationState {
    entries: HashMap<MovieKey, Vec<CommentRecord>>,
}

/// Handle to the aggregation state shared by all in-flight movies
pub type SharedAggregation = Arc<Mutex<AggregationState>>;

impl AggregationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a page's comments to the movie's entry, creating it if absent
    ///
    /// # Returns
    ///
    /// The number of comments accumulated for the movie so far
    pub fn append(&mut self, key: &MovieKey, comments: Vec<CommentRecord>) -> usize {
        let entry = self.entries.entry(key.clone()).or_default();
        entry.extend(comments);
        entry.len()
    }

    /// Comments accumulated for a movie, if it has an entry
    pub fn comments(&self, key: &MovieKey) -> Option<&[CommentRecord]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Removes a movie's entry and returns its comments
    pub fn take(&mut self, key: &MovieKey) -> Vec<CommentRecord> {
        self.entries.remove(key).unwrap_or_default()
    }

    /// Copies a movie's comments, leaving the entry in place
    pub fn snapshot(&self, key: &MovieKey) -> Vec<CommentRecord> {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    pub fn contains(&self, key: &MovieKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of movies with an entry
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One comments page to visit, with the movie it belongs to
#[derive(Debug, Clone)]
pub struct CommentJob {
    pub key: MovieKey,
    pub movie: MovieRecord,
    pub url: Url,
    /// 1-based position in the movie's comment pages
    pub page_num: u32,
    /// Every comments page of this movie visited so far, including `url`
    visited: HashSet<Url>,
}

impl CommentJob {
    /// Job for the first comments page of a movie
    pub fn first(movie: MovieRecord, detail_url: &Url, comments_url: Url) -> Self {
        Self {
            key: MovieKey::for_movie(&movie, detail_url.as_str()),
            movie,
            visited: HashSet::from([comments_url.clone()]),
            url: comments_url,
            page_num: 1,
        }
    }

    /// Job for the page following this one
    pub fn next(&self, url: Url) -> Self {
        let mut visited = self.visited.clone();
        visited.insert(url.clone());
        Self {
            key: self.key.clone(),
            movie: self.movie.clone(),
            url,
            page_num: self.page_num + 1,
            visited,
        }
    }

    /// Returns true if `url` is one of this movie's pages already visited
    pub fn has_visited(&self, url: &Url) -> bool {
        self.visited.contains(url)
    }
}

/// Why a movie's pagination ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// The page had no enabled next-page link
    LastPage,
    /// The detail page links no comments page; emitted without comments
    NoCommentsPage,
    /// A wait condition did not hold on `page_num`
    PaginationTimeout { page_num: u32, selector: String },
    /// Page `page_num` (> 1) could not be fetched or read
    FetchFailed { page_num: u32, message: String },
}

impl FinishReason {
    /// Stable name stored in the job directory
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastPage => "last_page",
            Self::NoCommentsPage => "no_comments_page",
            Self::PaginationTimeout { .. } => "pagination_timeout",
            Self::FetchFailed { .. } => "fetch_failed",
        }
    }

    /// Returns true if every comment page was read
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::LastPage | Self::NoCommentsPage)
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastPage => write!(f, "last page reached"),
            Self::NoCommentsPage => write!(f, "no comments page"),
            Self::PaginationTimeout { page_num, selector } => {
                write!(f, "page {} timed out waiting for '{}'", page_num, selector)
            }
            Self::FetchFailed { page_num, message } => {
                write!(f, "page {} failed: {}", page_num, message)
            }
        }
    }
}

/// A movie whose record is ready to be emitted
#[derive(Debug, Clone)]
pub struct FinishedMovie {
    pub key: MovieKey,
    /// The movie with all accumulated comments attached
    pub movie: MovieRecord,
    /// Number of the last comments page visited
    pub pages: u32,
    pub reason: FinishReason,
}

/// What to do after a page was absorbed
#[derive(Debug, Clone)]
pub enum PageOutcome {
    /// Visit the next page
    Next(CommentJob),
    /// The movie is done
    Finished(FinishedMovie),
}

/// Follows comment pages and assembles finished movie records
pub struct CommentAggregator {
    state: SharedAggregation,
    selectors: Arc<SiteSelectors>,
    wait_timeout: Duration,
    prune_completed: bool,
}

impl CommentAggregator {
    /// Creates an aggregator with a fresh state
    ///
    /// # Arguments
    ///
    /// * `selectors` - Compiled site selectors
    /// * `config` - Wait timeout and pruning settings
    pub fn new(selectors: Arc<SiteSelectors>, config: &PaginationConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(AggregationState::new())),
            selectors,
            wait_timeout: config.wait_timeout(),
            prune_completed: config.prune_completed,
        }
    }

    /// Handle to the aggregation state
    pub fn state(&self) -> SharedAggregation {
        Arc::clone(&self.state)
    }

    /// Conditions every comments page must satisfy before extraction
    pub fn wait_conditions(&self) -> Vec<WaitCondition> {
        vec![
            WaitCondition::visible(self.selectors.comment_item_css(), self.wait_timeout),
            WaitCondition::visible(self.selectors.pagination_container_css(), self.wait_timeout),
        ]
    }

    /// Reacts to a comments page that arrived and passed its wait conditions
    ///
    /// Appends the page's comments to the movie's entry, then either returns
    /// the job for the next page or finalizes the movie.
    pub fn absorb(&self, job: &CommentJob, html: &str) -> PageOutcome {
        let page = parse_comments_page(html, &job.url, &self.selectors);
        let found = page.comments.len();
        let total = self.state.lock().unwrap().append(&job.key, page.comments);

        tracing::debug!(
            "[{}] page {}: {} comments ({} total)",
            job.key.title,
            job.page_num,
            found,
            total
        );

        match page.next_page {
            Some(next) if job.has_visited(&next) => {
                tracing::warn!(
                    "[{}] next-page link on page {} points back to visited page {}, stopping",
                    job.key.title,
                    job.page_num,
                    next
                );
                PageOutcome::Finished(self.finalize(job, FinishReason::LastPage))
            }
            Some(next) => PageOutcome::Next(job.next(next)),
            None => PageOutcome::Finished(self.finalize(job, FinishReason::LastPage)),
        }
    }

    /// Finalizes a movie after pagination was cut short
    ///
    /// Whatever comments `html` holds are appended first; the next-page link
    /// is not followed.
    pub fn absorb_partial(
        &self,
        job: &CommentJob,
        html: Option<&str>,
        reason: FinishReason,
    ) -> FinishedMovie {
        let comments = html
            .map(|html| parse_comments_page(html, &job.url, &self.selectors).comments)
            .unwrap_or_default();
        self.state.lock().unwrap().append(&job.key, comments);

        self.finalize(job, reason)
    }

    fn finalize(&self, job: &CommentJob, reason: FinishReason) -> FinishedMovie {
        let comments = {
            let mut state = self.state.lock().unwrap();
            if self.prune_completed {
                state.take(&job.key)
            } else {
                state.snapshot(&job.key)
            }
        };

        tracing::info!(
            "[FINISHED {}] Got all comments for movie ({}), comments count: {}",
            job.key.title,
            reason.as_str(),
            comments.len()
        );

        FinishedMovie {
            key: job.key.clone(),
            movie: job.movie.with_comments(comments),
            pages: job.page_num,
            reason,
        }
    }

    /// Drops a movie's entry without emitting it
    pub fn abandon(&self, key: &MovieKey) {
        if self.state.lock().unwrap().entries.remove(key).is_some() {
            tracing::debug!("[{}] Abandoned accumulated comments", key.title);
        }
    }

    /// Waits for an open page, reads it and absorbs it
    ///
    /// Never fails: wait and read failures finalize the movie. Does not close
    /// the page.
    pub async fn process_page(&self, page: &mut dyn RenderedPage, job: &CommentJob) -> PageOutcome {
        for condition in self.wait_conditions() {
            if let Err(e) = page.wait_for(&condition).await {
                tracing::warn!("[{}] page {}: {}", job.key.title, job.page_num, e);

                // The page may still show comments without pagination
                let html = page.content().await.ok();
                let reason = FinishReason::PaginationTimeout {
                    page_num: job.page_num,
                    selector: condition.selector.clone(),
                };
                return PageOutcome::Finished(self.absorb_partial(job, html.as_deref(), reason));
            }
        }

        match page.content().await {
            Ok(html) => self.absorb(job, &html),
            Err(e) => {
                let reason = FinishReason::FetchFailed {
                    page_num: job.page_num,
                    message: e.to_string(),
                };
                PageOutcome::Finished(self.absorb_partial(job, None, reason))
            }
        }
    }

    /// Follows a movie's comment pages from `first` to the end
    ///
    /// Each page is opened through the scheduler and closed before the next
    /// one is opened.
    ///
    /// # Returns
    ///
    /// * `Ok(FinishedMovie)` - The record to emit
    /// * `Err(CrawlerError::Cancelled)` - The crawl was stopped; the entry was discarded
    /// * `Err(CrawlerError)` - The first comments page could not be opened
    pub async fn run_movie(
        &self,
        source: &dyn PageSource,
        scheduler: &Scheduler,
        first: CommentJob,
        cancel: &CancellationToken,
    ) -> Result<FinishedMovie, CrawlerError> {
        let mut job = first;

        loop {
            if cancel.is_cancelled() {
                self.abandon(&job.key);
                return Err(CrawlerError::Cancelled);
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = scheduler.acquire() => permit,
            };
            let Some(permit) = permit else {
                self.abandon(&job.key);
                return Err(CrawlerError::Cancelled);
            };

            let mut page = match source.open(&job.url).await {
                Ok(page) => page,
                Err(e) if job.page_num == 1 => {
                    self.abandon(&job.key);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!("[{}] page {}: {}", job.key.title, job.page_num, e);
                    let reason = FinishReason::FetchFailed {
                        page_num: job.page_num,
                        message: e.to_string(),
                    };
                    return Ok(self.absorb_partial(&job, None, reason));
                }
            };

            let outcome = self.process_page(page.as_mut(), &job).await;

            if let Err(e) = page.close().await {
                tracing::warn!("Failed to close page {}: {}", job.url, e);
            }
            drop(permit);

            match outcome {
                PageOutcome::Next(next) => job = next,
                PageOutcome::Finished(finished) => return Ok(finished),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;
    use crate::crawler::page::WaitError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BASE: &str = "https://www.kinobox.cz/film/1-pelisky/komentare";

    fn comments_page(users: &[&str], next: Option<&str>) -> String {
        let items: String = users
            .iter()
            .map(|user| {
                format!(
                    r#"<article class="UserRatingItem_container__HudHI">
                         <header><div><a>{user}</a></div><div class="UserRatingItem_score__kgilY">8</div></header>
                         <div class="UserRatingItem_ratingContent__i_LV0">text of {user}</div>
                       </article>"#
                )
            })
            .collect();
        let next = match next {
            Some(href) => format!(
                r#"<a href="{href}"><i class="Pagination_nextIcon__H_WMv"></i></a>"#
            ),
            None => r#"<a disabled><i class="Pagination_nextIcon__H_WMv"></i></a>"#.to_string(),
        };
        format!(
            r#"<html><body><main>{items}<div class="Pagination_container__PMgYg">{next}</div></main></body></html>"#
        )
    }

    #[derive(Clone)]
    struct ScriptedPage {
        html: String,
        wait_ok: bool,
    }

    #[derive(Default)]
    struct FakeSource {
        pages: HashMap<String, ScriptedPage>,
        opened: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
        open_log: Arc<Mutex<Vec<String>>>,
    }

    impl FakeSource {
        fn page(mut self, url: &str, html: String) -> Self {
            self.pages.insert(url.to_string(), ScriptedPage { html, wait_ok: true });
            self
        }

        fn stuck_page(mut self, url: &str, html: String) -> Self {
            self.pages.insert(url.to_string(), ScriptedPage { html, wait_ok: false });
            self
        }
    }

    struct FakePage {
        url: Url,
        script: ScriptedPage,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn open(&self, url: &Url) -> Result<Box<dyn RenderedPage>, CrawlerError> {
            self.open_log.lock().unwrap().push(url.to_string());
            let script = self.pages.get(url.as_str()).cloned().ok_or_else(|| {
                CrawlerError::PageOpen {
                    url: url.to_string(),
                    message: "HTTP 404".to_string(),
                }
            })?;
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakePage {
                url: url.clone(),
                script,
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    #[async_trait]
    impl RenderedPage for FakePage {
        fn url(&self) -> &Url {
            &self.url
        }

        async fn wait_for(&mut self, condition: &WaitCondition) -> Result<(), WaitError> {
            if self.script.wait_ok {
                Ok(())
            } else {
                Err(WaitError::Timeout {
                    selector: condition.selector.clone(),
                    timeout: condition.timeout,
                })
            }
        }

        async fn content(&mut self) -> Result<String, CrawlerError> {
            Ok(self.script.html.clone())
        }

        async fn close(&mut self) -> Result<(), CrawlerError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn aggregator(prune_completed: bool) -> CommentAggregator {
        let selectors = Arc::new(SiteSelectors::compile(&SelectorConfig::default()).unwrap());
        let config = PaginationConfig {
            wait_timeout: 100,
            poll_interval: 10,
            prune_completed,
        };
        CommentAggregator::new(selectors, &config)
    }

    fn movie(title: &str) -> MovieRecord {
        MovieRecord {
            title: Some(title.to_string()),
            year: Some("1999".to_string()),
            ..MovieRecord::default()
        }
    }

    fn first_job(title: &str) -> CommentJob {
        let detail = Url::parse("https://www.kinobox.cz/film/1-pelisky").unwrap();
        CommentJob::first(movie(title), &detail, Url::parse(BASE).unwrap())
    }

    fn page_url(n: u32) -> String {
        format!("{}?page={}", BASE, n)
    }

    fn users(movie: &MovieRecord) -> Vec<String> {
        movie
            .comments
            .iter()
            .filter_map(|comment| comment.user.clone())
            .collect()
    }

    #[test]
    fn test_absorb_grows_by_page_size_and_replay_duplicates() {
        let aggregator = aggregator(true);
        let job = first_job("Pelíšky");
        let html = comments_page(&["a", "b", "c"], Some("?page=2"));

        let outcome = aggregator.absorb(&job, &html);
        let PageOutcome::Next(next) = outcome else {
            panic!("expected a next page");
        };
        assert_eq!(next.page_num, 2);
        assert_eq!(next.url.as_str(), page_url(2));
        assert_eq!(next.movie, job.movie);

        let state = aggregator.state();
        assert_eq!(state.lock().unwrap().comments(&job.key).unwrap().len(), 3);

        aggregator.absorb(&job, &html);
        assert_eq!(state.lock().unwrap().comments(&job.key).unwrap().len(), 6);
    }

    #[test]
    fn test_absorb_last_page_finalizes_and_prunes() {
        let aggregator = aggregator(true);
        let job = first_job("Pelíšky");

        let PageOutcome::Finished(finished) =
            aggregator.absorb(&job, &comments_page(&["a", "b"], None))
        else {
            panic!("expected the movie to finish");
        };

        assert_eq!(finished.reason, FinishReason::LastPage);
        assert_eq!(users(&finished.movie), vec!["a", "b"]);
        assert_eq!(finished.movie.year.as_deref(), Some("1999"));
        assert_eq!(finished.movie.comments[0].rating, "80%");
        assert!(aggregator.state().lock().unwrap().is_empty());
    }

    #[test]
    fn test_finalize_without_pruning_keeps_entry() {
        let aggregator = aggregator(false);
        let job = first_job("Pelíšky");

        aggregator.absorb(&job, &comments_page(&["a"], None));

        let state = aggregator.state();
        assert!(state.lock().unwrap().contains(&job.key));
        assert_eq!(state.lock().unwrap().snapshot(&job.key).len(), 1);
    }

    #[test]
    fn test_same_title_different_movies_do_not_mix() {
        let aggregator = aggregator(true);
        let first = first_job("Babička");
        let detail = Url::parse("https://www.kinobox.cz/film/2-babicka").unwrap();
        let other = CommentJob::first(
            movie("Babička"),
            &detail,
            Url::parse("https://www.kinobox.cz/film/2-babicka/komentare").unwrap(),
        );

        aggregator.absorb(&first, &comments_page(&["a"], Some("?page=2")));
        let PageOutcome::Finished(finished) =
            aggregator.absorb(&other, &comments_page(&["x", "y"], None))
        else {
            panic!("expected the movie to finish");
        };

        assert_eq!(users(&finished.movie), vec!["x", "y"]);
        assert_eq!(
            aggregator.state().lock().unwrap().comments(&first.key).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_self_referencing_next_link_stops() {
        let aggregator = aggregator(true);
        let job = first_job("Pelíšky");
        let html = comments_page(&["a"], Some(BASE));

        assert!(matches!(
            aggregator.absorb(&job, &html),
            PageOutcome::Finished(FinishedMovie {
                reason: FinishReason::LastPage,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_pagination_cycle_stops_at_revisited_page() {
        let source = FakeSource::default()
            .page(BASE, comments_page(&["a", "b"], Some("?page=2")))
            .page(&page_url(2), comments_page(&["c"], Some(BASE)));
        let aggregator = aggregator(true);
        let scheduler = Scheduler::with_limits(4, Duration::ZERO);

        let finished = tokio::time::timeout(
            Duration::from_secs(5),
            aggregator.run_movie(&source, &scheduler, first_job("Pelíšky"), &CancellationToken::new()),
        )
        .await
        .expect("pagination cycle was followed forever")
        .unwrap();

        assert_eq!(users(&finished.movie), vec!["a", "b", "c"]);
        assert_eq!(finished.pages, 2);
        assert_eq!(finished.reason, FinishReason::LastPage);
        assert_eq!(source.opened.load(Ordering::SeqCst), 2);
        assert_eq!(source.closed.load(Ordering::SeqCst), 2);
        assert!(aggregator.state().lock().unwrap().is_empty());
    }

    #[test]
    fn test_next_job_tracks_visited_pages() {
        let job = first_job("Pelíšky");
        let second = job.next(Url::parse(&page_url(2)).unwrap());

        assert!(second.has_visited(&Url::parse(BASE).unwrap()));
        assert!(second.has_visited(&Url::parse(&page_url(2)).unwrap()));
        assert!(!job.has_visited(&Url::parse(&page_url(2)).unwrap()));
    }

    #[tokio::test]
    async fn test_run_movie_concatenates_pages_in_order() {
        let source = FakeSource::default()
            .page(BASE, comments_page(&["a", "b"], Some("?page=2")))
            .page(&page_url(2), comments_page(&["c", "d"], Some("?page=3")))
            .page(&page_url(3), comments_page(&["e"], None));
        let aggregator = aggregator(true);
        let scheduler = Scheduler::with_limits(4, Duration::ZERO);

        let finished = aggregator
            .run_movie(&source, &scheduler, first_job("Pelíšky"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(users(&finished.movie), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(finished.pages, 3);
        assert_eq!(finished.reason, FinishReason::LastPage);
        assert_eq!(
            *source.open_log.lock().unwrap(),
            vec![BASE.to_string(), page_url(2), page_url(3)]
        );
        assert_eq!(source.opened.load(Ordering::SeqCst), 3);
        assert_eq!(source.closed.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.available_permits(), 4);
    }

    #[tokio::test]
    async fn test_wait_timeout_on_second_page_keeps_first_page() {
        let source = FakeSource::default()
            .page(BASE, comments_page(&["a", "b", "c"], Some("?page=2")))
            .stuck_page(&page_url(2), "<html><body>loading</body></html>".to_string());
        let aggregator = aggregator(true);
        let scheduler = Scheduler::with_limits(4, Duration::ZERO);

        let finished = aggregator
            .run_movie(&source, &scheduler, first_job("Pelíšky"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(users(&finished.movie), vec!["a", "b", "c"]);
        assert_eq!(
            finished.reason,
            FinishReason::PaginationTimeout {
                page_num: 2,
                selector: "article.UserRatingItem_container__HudHI".to_string(),
            }
        );
        assert!(!finished.reason.is_complete());
        assert_eq!(source.opened.load(Ordering::SeqCst), 2);
        assert_eq!(source.closed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_wait_timeout_extracts_visible_comments() {
        let source = FakeSource::default().stuck_page(BASE, comments_page(&["a", "b"], Some("?page=2")));
        let aggregator = aggregator(true);
        let scheduler = Scheduler::with_limits(1, Duration::ZERO);

        let finished = aggregator
            .run_movie(&source, &scheduler, first_job("Pelíšky"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(users(&finished.movie), vec!["a", "b"]);
        assert_eq!(finished.pages, 1);
        assert_eq!(source.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_on_later_page_finalizes() {
        let source =
            FakeSource::default().page(BASE, comments_page(&["a"], Some("?page=2")));
        let aggregator = aggregator(true);
        let scheduler = Scheduler::with_limits(4, Duration::ZERO);

        let finished = aggregator
            .run_movie(&source, &scheduler, first_job("Pelíšky"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(users(&finished.movie), vec!["a"]);
        assert!(matches!(
            finished.reason,
            FinishReason::FetchFailed { page_num: 2, .. }
        ));
        assert_eq!(source.opened.load(Ordering::SeqCst), source.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_first_page_failure_is_an_error() {
        let source = FakeSource::default();
        let aggregator = aggregator(true);
        let scheduler = Scheduler::with_limits(4, Duration::ZERO);

        let result = aggregator
            .run_movie(&source, &scheduler, first_job("Pelíšky"), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(CrawlerError::PageOpen { .. })));
        assert!(aggregator.state().lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_movie_is_abandoned() {
        let source = FakeSource::default().page(BASE, comments_page(&["a"], None));
        let aggregator = aggregator(true);
        let scheduler = Scheduler::with_limits(4, Duration::ZERO);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = aggregator
            .run_movie(&source, &scheduler, first_job("Pelíšky"), &cancel)
            .await;

        assert!(matches!(result, Err(CrawlerError::Cancelled)));
        assert_eq!(source.opened.load(Ordering::SeqCst), 0);
        assert!(aggregator.state().lock().unwrap().is_empty());
    }

    #[test]
    fn test_finish_reason_names() {
        assert_eq!(FinishReason::LastPage.as_str(), "last_page");
        assert!(FinishReason::LastPage.is_complete());
        let timeout = FinishReason::PaginationTimeout {
            page_num: 4,
            selector: ".x".to_string(),
        };
        assert_eq!(timeout.as_str(), "pagination_timeout");
        assert_eq!(timeout.to_string(), "page 4 timed out waiting for '.x'");
    }
}
