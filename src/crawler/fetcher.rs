//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent
//! - GET requests to fetch page content
//! - Retry logic for rate limiting and transient failures
//! - Error classification

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::CrawlerError;
use reqwest::Client;
use std::time::Duration;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Page body content
        body: String,
    },

    /// Non-success HTTP status, after any retries
    HttpError {
        /// The HTTP status code of the last attempt
        status_code: u16,
        /// Number of attempts made
        attempts: u32,
    },

    /// Network error (connection refused, timeout, etc.), after any retries
    NetworkError {
        /// Error description
        error: String,
        /// Number of attempts made
        attempts: u32,
    },
}

impl FetchResult {
    /// Converts the result into the final URL and body, or a crawler error
    pub fn into_body(self, url: &str) -> Result<(String, String), CrawlerError> {
        match self {
            Self::Success {
                final_url, body, ..
            } => Ok((final_url, body)),
            Self::HttpError {
                status_code,
                attempts,
            } => Err(CrawlerError::Http {
                url: url.to_string(),
                message: format!("HTTP {} after {} attempt(s)", status_code, attempts),
            }),
            Self::NetworkError { error, attempts } => Err(CrawlerError::Http {
                url: url.to_string(),
                message: format!("{} after {} attempt(s)", error, attempts),
            }),
        }
    }
}

/// When and how often a failed request is repeated
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retry_times: u32,
    /// Status codes retried in addition to 5xx
    pub retry_http_codes: Vec<u16>,
    /// Base delay, multiplied by the attempt number
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            retry_times: config.retry_times,
            retry_http_codes: config.retry_http_codes.clone(),
            retry_delay: config.retry_delay(),
        }
    }

    /// Returns true if a response with this status should be retried
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_http_codes.contains(&status) || (500..600).contains(&status)
    }

    /// Delay before the given retry (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        self.retry_delay * retry
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `crawler` - Crawler settings providing the request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.value.clone())
        .timeout(crawler.request_timeout())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL with retry logic
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Status in `retry-http-codes` (429) | Retry up to `retry-times`, linear backoff |
/// | HTTP 5xx | Retry up to `retry-times`, linear backoff |
/// | Timeout / connection error | Retry up to `retry-times`, linear backoff |
/// | HTTP 404 and other statuses | Immediate → HttpError |
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
/// * `policy` - Retry policy
///
/// # Returns
///
/// A FetchResult indicating success or the type of failure
pub async fn fetch_url(client: &Client, url: &str, policy: &RetryPolicy) -> FetchResult {
    let mut attempt = 0;

    loop {
        attempt += 1;
        let can_retry = attempt <= policy.retry_times;

        let result = match client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                let final_url = response.url().to_string();

                if status.is_success() {
                    match response.text().await {
                        Ok(body) => {
                            return FetchResult::Success {
                                final_url,
                                status_code: status.as_u16(),
                                body,
                            }
                        }
                        Err(e) => FetchResult::NetworkError {
                            error: e.to_string(),
                            attempts: attempt,
                        },
                    }
                } else if policy.should_retry_status(status.as_u16()) {
                    FetchResult::HttpError {
                        status_code: status.as_u16(),
                        attempts: attempt,
                    }
                } else {
                    return FetchResult::HttpError {
                        status_code: status.as_u16(),
                        attempts: attempt,
                    };
                }
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    "Request timeout".to_string()
                } else if e.is_connect() {
                    "Connection refused".to_string()
                } else {
                    e.to_string()
                };
                FetchResult::NetworkError {
                    error,
                    attempts: attempt,
                }
            }
        };

        if !can_retry {
            return result;
        }

        let delay = policy.backoff(attempt);
        tracing::debug!(
            "Retrying {} ({}/{}) in {:?}: {:?}",
            url,
            attempt,
            policy.retry_times,
            delay,
            result
        );
        tokio::time::sleep(delay).await;
    }
}
