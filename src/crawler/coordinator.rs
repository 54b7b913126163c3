//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Opening the job directory and resuming or starting a run
//! - Discovering movie detail pages from the listing or the sitemap
//! - Running movies concurrently through the comment aggregator
//! - Writing finished records and persisting movie states
//! - Handling stop requests

use crate::config::{Config, Renderer};
use crate::crawler::aggregator::{CommentAggregator, CommentJob, FinishReason, FinishedMovie};
use crate::crawler::page::{HttpPageSource, PageSource};
use crate::crawler::scheduler::{MovieFrontier, QueuedMovie, Scheduler};
use crate::crawler::{build_http_client, fetch_url, job_dir, RetryPolicy, Spider};
use crate::extract::{extract_movie_links, matches_rule, parse_detail_page, parse_sitemap};
use crate::extract::{SiteSelectors, Sitemap};
use crate::model::MovieKey;
use crate::output::ItemSink;
use crate::state::MovieState;
use crate::storage::{open_storage, reset_job_dir, MovieOutcome, RunStatus, SqliteStorage, Storage};
use crate::url::{is_same_site, normalize_url};
use crate::CrawlerError;
use reqwest::Client;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Path fragment identifying movie detail pages in the sitemap
const MOVIE_URL_RULE: &str = "/film/";

/// How a crawl is started
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub spider: Spider,
    /// Reset the job directory and start a new run
    pub fresh: bool,
    /// Hash of the configuration file, stored with the run
    pub config_hash: String,
}

/// Live counters, readable while the crawl runs
#[derive(Debug, Default)]
pub struct CrawlProgress {
    discovered: AtomicU64,
    in_flight: AtomicU64,
    emitted: AtomicU64,
    failed: AtomicU64,
}

impl CrawlProgress {
    /// Movies newly discovered in this run
    pub fn discovered(&self) -> u64 {
        self.discovered.load(Ordering::Relaxed)
    }

    /// Movies currently being crawled
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Records written in this run
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Everything a spawned movie task needs
#[derive(Clone)]
struct MovieContext {
    storage: Arc<Mutex<SqliteStorage>>,
    scheduler: Arc<Scheduler>,
    source: Arc<dyn PageSource>,
    aggregator: Arc<CommentAggregator>,
    selectors: Arc<SiteSelectors>,
    cancel: CancellationToken,
}

impl MovieContext {
    /// Opens a page through the scheduler and returns its HTML
    ///
    /// The page is closed and the permit released before returning.
    async fn read_page(&self, url: &Url) -> Result<String, CrawlerError> {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = self.scheduler.acquire() => permit,
        };
        let Some(permit) = permit else {
            return Err(CrawlerError::Cancelled);
        };

        let mut page = self.source.open(url).await?;
        let content = page.content().await;
        if let Err(e) = page.close().await {
            tracing::warn!("Failed to close page {}: {}", url, e);
        }
        drop(permit);

        content
    }

    /// Crawls one movie: its detail page, then every comments page
    async fn crawl_movie(self, queued: QueuedMovie) -> Result<FinishedMovie, CrawlerError> {
        let html = self.read_page(&queued.url).await?;
        let detail = parse_detail_page(&html, &queued.url, &self.selectors);
        let movie = detail.movie;

        tracing::info!("[STARTED {}] url: {}", movie.display_title(), queued.url);

        {
            let mut storage = self.storage.lock().unwrap();
            storage.update_movie_state(
                queued.movie_id,
                MovieState::Paginating,
                movie.title.as_deref(),
            )?;
        }

        match detail.comments_url {
            Some(comments_url) => {
                let first = CommentJob::first(movie, &queued.url, comments_url);
                self.aggregator
                    .run_movie(self.source.as_ref(), &self.scheduler, first, &self.cancel)
                    .await
            }
            None => {
                tracing::info!(
                    "[FINISHED {}] no comments page, 0 comments",
                    movie.display_title()
                );
                Ok(FinishedMovie {
                    key: MovieKey::for_movie(&movie, queued.url.as_str()),
                    movie,
                    pages: 0,
                    reason: FinishReason::NoCommentsPage,
                })
            }
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    spider: Spider,
    storage: Arc<Mutex<SqliteStorage>>,
    scheduler: Arc<Scheduler>,
    client: Client,
    policy: RetryPolicy,
    source: Arc<dyn PageSource>,
    aggregator: Arc<CommentAggregator>,
    selectors: Arc<SiteSelectors>,
    sink: Arc<dyn ItemSink>,
    cancel: CancellationToken,
    progress: Arc<CrawlProgress>,
    run_id: i64,
    resumed: bool,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `options` - Spider, fresh start flag and config hash
    /// * `sink` - Receives every finished movie record
    /// * `cancel` - Stops the crawl when cancelled
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(CrawlerError)` - Failed to initialize
    pub async fn new(
        config: Config,
        options: CrawlOptions,
        sink: Arc<dyn ItemSink>,
        cancel: CancellationToken,
    ) -> Result<Self, CrawlerError> {
        let spider = options.spider;
        let job_dir = job_dir(&config.output, spider);

        if options.fresh {
            let removed = reset_job_dir(&job_dir)?;
            tracing::info!(
                "Reset job directory {} ({} entries removed)",
                job_dir.display(),
                removed
            );
        }

        // Initialize storage
        let mut storage = open_storage(&job_dir)?;

        // Create or resume run
        let latest = storage.get_latest_run()?;
        let (run_id, resumed) = match latest {
            Some(run) if !options.fresh && run.status.is_resumable() => {
                if run.config_hash != options.config_hash {
                    tracing::warn!(
                        "Configuration changed since run {} was started; resuming anyway",
                        run.id
                    );
                }
                storage.update_run_status(run.id, RunStatus::Running)?;
                tracing::info!("Resuming run {} of {}", run.id, run.spider);
                (run.id, true)
            }
            _ => {
                let run_id = storage.create_run(spider.name(), &options.config_hash)?;
                tracing::info!("Starting run {} of {}", run_id, spider);
                (run_id, false)
            }
        };

        let reset = storage.reset_interrupted_movies()?;
        if reset > 0 {
            tracing::info!("Returned {} interrupted movies to the queue", reset);
        }

        let selectors = Arc::new(SiteSelectors::compile(&config.selectors)?);
        let client = build_http_client(&config.user_agent, &config.crawler)?;
        let policy = RetryPolicy::from_config(&config.crawler);
        let source = build_page_source(&config, client.clone(), policy.clone()).await?;
        let aggregator = Arc::new(CommentAggregator::new(
            Arc::clone(&selectors),
            &config.pagination,
        ));
        let scheduler = Arc::new(Scheduler::new(&config.crawler));

        Ok(Self {
            config: Arc::new(config),
            spider,
            storage: Arc::new(Mutex::new(storage)),
            scheduler,
            client,
            policy,
            source,
            aggregator,
            selectors,
            sink,
            cancel,
            progress: Arc::new(CrawlProgress::default()),
            run_id,
            resumed,
        })
    }

    /// ID of the run this coordinator records into
    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Shared progress counters, e.g. for the control channel
    pub fn progress(&self) -> Arc<CrawlProgress> {
        Arc::clone(&self.progress)
    }

    /// Runs the crawl to completion or until stopped
    ///
    /// The run is marked `completed`, `interrupted` (stopped) or `failed`.
    /// A stop is not an error.
    pub async fn run(&mut self) -> Result<(), CrawlerError> {
        let start_time = std::time::Instant::now();
        let result = self.crawl().await;
        self.scheduler.close();

        let status = match &result {
            Ok(()) if self.cancel.is_cancelled() => RunStatus::Interrupted,
            Ok(()) => RunStatus::Completed,
            Err(CrawlerError::Cancelled) => RunStatus::Interrupted,
            Err(_) => RunStatus::Failed,
        };

        {
            let mut storage = self.storage.lock().unwrap();
            storage.finish_run(self.run_id, status)?;
        }

        if let Err(e) = self.sink.flush() {
            tracing::error!("Failed to flush items: {}", e);
        }
        if let Err(e) = self.source.shutdown().await {
            tracing::warn!("Failed to shut down page source: {}", e);
        }

        tracing::info!(
            "Run {} {}: {} records written, {} failed in {:?}",
            self.run_id,
            status.to_db_string(),
            self.progress.emitted(),
            self.progress.failed(),
            start_time.elapsed()
        );

        match result {
            Err(CrawlerError::Cancelled) => Ok(()),
            other => other,
        }
    }

    async fn crawl(&mut self) -> Result<(), CrawlerError> {
        let known = {
            let storage = self.storage.lock().unwrap();
            storage.count_total_movies()?
        };

        if self.resumed && known > 0 {
            tracing::info!("Skipping discovery, {} movies already known", known);
        } else {
            let found = self.discover().await;
            tracing::info!("Discovery found {} new movies", found);
        }

        let pending = {
            let storage = self.storage.lock().unwrap();
            storage.get_movies_by_state(MovieState::Discovered)?
        };
        let mut frontier: MovieFrontier = pending
            .into_iter()
            .filter_map(|movie| match Url::parse(&movie.url) {
                Ok(url) => Some(QueuedMovie {
                    movie_id: movie.id,
                    url,
                }),
                Err(e) => {
                    tracing::warn!("Skipping stored movie {}: {}", movie.url, e);
                    None
                }
            })
            .collect();

        tracing::info!("{} movies queued", frontier.len());

        let max_movies = self.config.crawler.max_concurrent_movies.max(1) as usize;
        let mut tasks = JoinSet::new();

        loop {
            while tasks.len() < max_movies && !self.cancel.is_cancelled() {
                let Some(queued) = frontier.pop() else {
                    break;
                };

                {
                    let mut storage = self.storage.lock().unwrap();
                    storage.update_movie_state(queued.movie_id, MovieState::Fetching, None)?;
                }

                let context = self.movie_context();
                let movie_id = queued.movie_id;
                tasks.spawn(async move { (movie_id, context.crawl_movie(queued).await) });
            }
            self.progress
                .in_flight
                .store(tasks.len() as u64, Ordering::Relaxed);

            match tasks.join_next().await {
                None => break,
                Some(Ok((movie_id, result))) => self.record_result(movie_id, result)?,
                Some(Err(e)) => tracing::error!("Movie task failed: {}", e),
            }
        }
        self.progress.in_flight.store(0, Ordering::Relaxed);

        if self.cancel.is_cancelled() {
            tracing::info!("Crawl stopped, {} movies left in the queue", frontier.len());
        } else {
            tracing::info!("Queue is empty, crawl complete");
        }

        Ok(())
    }

    fn movie_context(&self) -> MovieContext {
        MovieContext {
            storage: Arc::clone(&self.storage),
            scheduler: Arc::clone(&self.scheduler),
            source: Arc::clone(&self.source),
            aggregator: Arc::clone(&self.aggregator),
            selectors: Arc::clone(&self.selectors),
            cancel: self.cancel.clone(),
        }
    }

    /// Writes a finished record and persists the movie's terminal state
    fn record_result(
        &self,
        movie_id: i64,
        result: Result<FinishedMovie, CrawlerError>,
    ) -> Result<(), CrawlerError> {
        let mut storage = self.storage.lock().unwrap();

        match result {
            Ok(finished) => {
                self.sink.write_item(&finished.movie)?;
                self.progress.emitted.fetch_add(1, Ordering::Relaxed);

                let complete = finished.reason.is_complete();
                let outcome = MovieOutcome {
                    state: if complete {
                        MovieState::Completed
                    } else {
                        MovieState::Partial
                    },
                    title: finished.movie.title.clone(),
                    comment_pages: finished.pages,
                    comment_count: finished.movie.comments.len() as u64,
                    finish_reason: Some(finished.reason.as_str().to_string()),
                    error_message: (!complete).then(|| finished.reason.to_string()),
                };
                storage.finish_movie(movie_id, &outcome)?;
            }
            Err(CrawlerError::Cancelled) => {
                storage.update_movie_state(movie_id, MovieState::Discovered, None)?;
            }
            Err(e) => {
                tracing::warn!("Movie {} failed: {}", movie_id, e);
                self.progress.failed.fetch_add(1, Ordering::Relaxed);

                let outcome = MovieOutcome {
                    state: MovieState::Failed,
                    title: None,
                    comment_pages: 0,
                    comment_count: 0,
                    finish_reason: None,
                    error_message: Some(e.to_string()),
                };
                storage.finish_movie(movie_id, &outcome)?;
            }
        }

        Ok(())
    }

    fn start_urls(&self) -> Vec<String> {
        if self.config.crawler.start_urls.is_empty() {
            self.spider.default_start_urls()
        } else {
            self.config.crawler.start_urls.clone()
        }
    }

    /// Discovers movie detail pages and records them as `discovered`
    ///
    /// Failing start pages are logged and skipped.
    ///
    /// # Returns
    ///
    /// The number of movies not seen before
    async fn discover(&self) -> usize {
        let mut found = 0;

        for start in self.start_urls() {
            if self.cancel.is_cancelled() {
                break;
            }

            let start_url = match Url::parse(&start) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!("Invalid start URL {}: {}", start, e);
                    continue;
                }
            };

            let result = match self.spider {
                Spider::Kinobox => self.discover_from_listing(&start_url).await,
                Spider::KinoboxSitemap => self.discover_from_sitemap(&start_url).await,
            };

            match result {
                Ok(count) => found += count,
                Err(CrawlerError::Cancelled) => break,
                Err(e) => tracing::warn!("Discovery from {} failed: {}", start_url, e),
            }
        }

        found
    }

    async fn discover_from_listing(&self, listing_url: &Url) -> Result<usize, CrawlerError> {
        let html = self.movie_context().read_page(listing_url).await?;
        let links = extract_movie_links(&html, listing_url, &self.selectors);
        tracing::info!("Found {} movie links on {}", links.len(), listing_url);

        let mut found = 0;
        for link in links.iter().filter(|link| is_same_site(link, listing_url)) {
            if self.register_movie(link.as_str())? {
                found += 1;
            }
        }
        Ok(found)
    }

    /// Follows a sitemap and its nested indexes, registering movie URLs
    async fn discover_from_sitemap(&self, root: &Url) -> Result<usize, CrawlerError> {
        let mut queue = VecDeque::from([root.to_string()]);
        let mut visited = HashSet::new();
        let mut found = 0;

        while let Some(location) = queue.pop_front() {
            if !visited.insert(location.clone()) {
                continue;
            }

            let body = match self.fetch_sitemap(&location).await {
                Ok(body) => body,
                Err(CrawlerError::Cancelled) => return Err(CrawlerError::Cancelled),
                Err(e) => {
                    tracing::warn!("Skipping sitemap {}: {}", location, e);
                    continue;
                }
            };

            match parse_sitemap(&body) {
                Ok(Sitemap::Index(children)) => {
                    tracing::debug!("Sitemap index {} lists {} sitemaps", location, children.len());
                    queue.extend(children.into_iter().filter(|c| !visited.contains(c)));
                }
                Ok(Sitemap::UrlSet(locations)) => {
                    let movies = locations.iter().filter(|loc| {
                        matches_rule(loc, MOVIE_URL_RULE)
                            && Url::parse(loc).is_ok_and(|url| is_same_site(&url, root))
                    });
                    for loc in movies {
                        if self.register_movie(loc)? {
                            found += 1;
                        }
                    }
                }
                Err(e) => {
                    let error = CrawlerError::Sitemap {
                        url: location.clone(),
                        message: e.to_string(),
                    };
                    tracing::warn!("{}", error);
                }
            }
        }

        Ok(found)
    }

    async fn fetch_sitemap(&self, location: &str) -> Result<String, CrawlerError> {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = self.scheduler.acquire() => permit,
        };
        let Some(_permit) = permit else {
            return Err(CrawlerError::Cancelled);
        };

        let (_, body) = fetch_url(&self.client, location, &self.policy)
            .await
            .into_body(location)?;
        Ok(body)
    }

    /// Records a detail page URL; returns whether it was new
    fn register_movie(&self, url: &str) -> Result<bool, CrawlerError> {
        let normalized = match normalize_url(url) {
            Ok(n) => n,
            Err(e) => {
                tracing::debug!("Failed to normalize URL {}: {}", url, e);
                return Ok(false);
            }
        };

        let (_, inserted) = {
            let mut storage = self.storage.lock().unwrap();
            storage.insert_or_get_movie(normalized.as_str(), self.run_id)?
        };
        if inserted {
            self.progress.discovered.fetch_add(1, Ordering::Relaxed);
        }
        Ok(inserted)
    }
}

/// Builds the page source selected by `fetch.renderer`
pub async fn build_page_source(
    config: &Config,
    client: Client,
    policy: RetryPolicy,
) -> Result<Arc<dyn PageSource>, CrawlerError> {
    match config.fetch.renderer {
        Renderer::Http => Ok(Arc::new(HttpPageSource::new(
            client,
            policy,
            config.pagination.poll_interval(),
        ))),
        #[cfg(feature = "browser")]
        Renderer::Browser => {
            let source = crate::crawler::BrowserPageSource::launch(
                &config.fetch,
                &config.user_agent.value,
                config.pagination.poll_interval(),
            )
            .await?;
            Ok(Arc::new(source))
        }
        #[cfg(not(feature = "browser"))]
        Renderer::Browser => Err(crate::ConfigError::Validation(
            "renderer = \"browser\" requires building with the `browser` feature".to_string(),
        )
        .into()),
    }
}

/// Runs a whole crawl
///
/// # Example
///
/// ```no_run
/// use kinobox_crawler::config::load_or_default;
/// use kinobox_crawler::crawler::{run_crawl, CrawlOptions, Spider};
/// use kinobox_crawler::output::MemorySink;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, config_hash) = load_or_default(None)?;
/// let options = CrawlOptions { spider: Spider::Kinobox, fresh: false, config_hash };
/// run_crawl(config, options, Arc::new(MemorySink::new()), CancellationToken::new()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    options: CrawlOptions,
    sink: Arc<dyn ItemSink>,
    cancel: CancellationToken,
) -> Result<(), CrawlerError> {
    let mut coordinator = Coordinator::new(config, options, sink, cancel).await?;
    coordinator.run().await
}
