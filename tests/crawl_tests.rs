//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a miniature kinobox site and run the full
//! crawl cycle end-to-end: listing, detail page, every comments page, JSON-lines
//! output and persisted state.

use kinobox_crawler::config::{Config, OutputConfig};
use kinobox_crawler::crawler::{items_path, job_dir, run_crawl, CrawlOptions, Spider};
use kinobox_crawler::output::{generate_summary, JsonLinesSink};
use kinobox_crawler::storage::{open_storage, RunStatus, Storage};
use kinobox_crawler::{MovieRecord, MovieState};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MOVIE_PATH: &str = "/film/1-example-movie";
const COMMENTS_PATH: &str = "/film/1-example-movie/komentare";
const COMMENTS_PAGE_2_PATH: &str = "/film/1-example-movie/komentare/2";

/// Creates a test configuration writing into `job_root`
fn create_test_config(job_root: &TempDir, start_url: String) -> Config {
    let mut config = Config::default();
    config.crawler.start_urls = vec![start_url];
    config.crawler.minimum_time_between_requests = 10;
    config.crawler.retry_times = 1;
    config.crawler.retry_delay = 10;
    config.pagination.wait_timeout = 300;
    config.pagination.poll_interval = 50;
    config.control.enabled = false;
    config.output = OutputConfig {
        job_root: job_root.path().to_string_lossy().to_string(),
        items_path: None,
    };
    config
}

fn listing_page() -> String {
    format!(
        r#"<html><body><main><ol>
             <li><div class="FilmRankingItemExtended_metaRowWrapper__r3NGx">
               <a data-context="title" href="{MOVIE_PATH}">Example Movie</a>
             </div></li>
           </ol></main></body></html>"#
    )
}

fn detail_page() -> String {
    format!(
        r#"<html><body>
             <div class="FilmLayout_metadata__7nnz4">
               <h1>Example Movie</h1>
               <h2>Example Movie (English)</h2>
               <p class="FilmLayout_yearLabel__MYmp_">1999</p>
             </div>
             <ul role="list">
               <li><a href="{MOVIE_PATH}">Přehled</a></li>
               <li><a href="{MOVIE_PATH}/herci">Herci</a></li>
               <li><a href="{COMMENTS_PATH}"><i title="Komentáře"></i> Komentáře</a></li>
             </ul>
             <main><div class="FilmPageOverviewContainer_summary__DJLug">A movie used in tests.</div></main>
           </body></html>"#
    )
}

fn comments_page(comments: &[(&str, &str)], next: Option<&str>) -> String {
    let items: String = comments
        .iter()
        .map(|(user, score)| {
            format!(
                r#"<article class="UserRatingItem_container__HudHI">
                     <header>
                       <div><a href="/uzivatel/{user}">{user}</a></div>
                       <div class="UserRatingItem_score__kgilY">{score}</div>
                       <time>1. ledna 2024</time>
                     </header>
                     <div class="UserRatingItem_ratingContent__i_LV0">Comment by {user}</div>
                     <footer><div>3</div></footer>
                   </article>"#
            )
        })
        .collect();

    let next = match next {
        Some(href) => format!(r#"<a href="{href}"><i class="Pagination_nextIcon__H_WMv"></i></a>"#),
        None => r#"<a disabled=""><i class="Pagination_nextIcon__H_WMv"></i></a>"#.to_string(),
    };

    format!(
        r#"<html><body><main>{items}
             <nav class="Pagination_container__PMgYg"><a href="{COMMENTS_PATH}">1</a>{next}</nav>
           </main></body></html>"#
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

async fn mount_site(server: &MockServer) {
    mount_page(server, "/zebricky/nejlepsi/filmy", listing_page()).await;
    mount_page(server, MOVIE_PATH, detail_page()).await;
    mount_page(
        server,
        COMMENTS_PATH,
        comments_page(
            &[("alice", "8"), ("bob", "7.8"), ("carol", "")],
            Some(COMMENTS_PAGE_2_PATH),
        ),
    )
    .await;
    mount_page(
        server,
        COMMENTS_PAGE_2_PATH,
        comments_page(&[("dave", "10"), ("erin", "2.5")], None),
    )
    .await;
}

fn read_items(config: &Config) -> Vec<MovieRecord> {
    let content = std::fs::read_to_string(items_path(&config.output, Spider::Kinobox)).unwrap();
    content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

async fn crawl(config: &Config, fresh: bool) {
    let sink = JsonLinesSink::create(&items_path(&config.output, Spider::Kinobox)).unwrap();
    let options = CrawlOptions {
        spider: Spider::Kinobox,
        fresh,
        config_hash: "test-hash".to_string(),
    };
    run_crawl(config.clone(), options, Arc::new(sink), CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_movie_with_two_comment_pages() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let job_root = TempDir::new().unwrap();
    let config = create_test_config(
        &job_root,
        format!("{}/zebricky/nejlepsi/filmy", server.uri()),
    );

    crawl(&config, true).await;

    let items = read_items(&config);
    assert_eq!(items.len(), 1);

    let movie = &items[0];
    assert_eq!(movie.title.as_deref(), Some("Example Movie"));
    assert_eq!(movie.year.as_deref(), Some("1999"));
    assert_eq!(movie.description.as_deref(), Some("A movie used in tests."));

    let users: Vec<_> = movie
        .comments
        .iter()
        .map(|c| c.user.as_deref().unwrap())
        .collect();
    assert_eq!(users, vec!["alice", "bob", "carol", "dave", "erin"]);

    let ratings: Vec<_> = movie.comments.iter().map(|c| c.rating.as_str()).collect();
    assert_eq!(ratings, vec!["80%", "78%", "N/A", "100%", "25%"]);
    assert_eq!(movie.comments[3].text.as_deref(), Some("Comment by dave"));

    let storage = open_storage(&job_dir(&config.output, Spider::Kinobox)).unwrap();
    let stored = storage
        .get_movie_by_url(&format!("{}{}", server.uri(), MOVIE_PATH))
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, MovieState::Completed);
    assert_eq!(stored.comment_pages, 2);
    assert_eq!(stored.comment_count, 5);
    assert_eq!(stored.finish_reason.as_deref(), Some("last_page"));

    let summary = generate_summary(&storage).unwrap();
    assert_eq!(summary.status, RunStatus::Completed.to_db_string());
    assert_eq!(summary.statistics.total_comments, 5);
}

#[tokio::test]
async fn test_second_page_timeout_keeps_first_page_comments() {
    let server = MockServer::start().await;
    mount_page(&server, "/zebricky/nejlepsi/filmy", listing_page()).await;
    mount_page(&server, MOVIE_PATH, detail_page()).await;
    mount_page(
        &server,
        COMMENTS_PATH,
        comments_page(&[("alice", "8"), ("bob", "6")], Some(COMMENTS_PAGE_2_PATH)),
    )
    .await;
    // Page 2 never shows its comment list
    mount_page(
        &server,
        COMMENTS_PAGE_2_PATH,
        "<html><body><main><p>Loading…</p></main></body></html>".to_string(),
    )
    .await;

    let job_root = TempDir::new().unwrap();
    let config = create_test_config(
        &job_root,
        format!("{}/zebricky/nejlepsi/filmy", server.uri()),
    );

    crawl(&config, true).await;

    let items = read_items(&config);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].comments.len(), 2);

    let storage = open_storage(&job_dir(&config.output, Spider::Kinobox)).unwrap();
    let partial = storage.get_movies_by_state(MovieState::Partial).unwrap();
    assert_eq!(partial.len(), 1);
    assert_eq!(partial[0].finish_reason.as_deref(), Some("pagination_timeout"));
}

#[tokio::test]
async fn test_rerun_does_not_emit_completed_movies_again() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let job_root = TempDir::new().unwrap();
    let config = create_test_config(
        &job_root,
        format!("{}/zebricky/nejlepsi/filmy", server.uri()),
    );

    crawl(&config, true).await;
    crawl(&config, false).await;

    assert_eq!(read_items(&config).len(), 1);

    let storage = open_storage(&job_dir(&config.output, Spider::Kinobox)).unwrap();
    assert_eq!(storage.count_total_movies().unwrap(), 1);
    assert_eq!(
        storage.get_latest_run().unwrap().unwrap().status,
        RunStatus::Completed
    );
}
