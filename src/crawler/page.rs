//! Rendered pages and wait conditions
//!
//! A `PageSource` opens a `RenderedPage` for a URL. Before extraction the
//! caller waits for the elements it needs; a condition that is not met in
//! time yields `WaitError::Timeout`. Every opened page must be closed.

use crate::crawler::fetcher::{fetch_url, RetryPolicy};
use crate::CrawlerError;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use url::Url;

/// State an element must reach for a wait condition to hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    /// Present in the document
    Attached,
    /// Present and not hidden
    Visible,
}

/// An element the page must contain before extraction
#[derive(Debug, Clone)]
pub struct WaitCondition {
    pub selector: String,
    pub state: ElementState,
    pub timeout: Duration,
}

impl WaitCondition {
    pub fn visible(selector: impl Into<String>, timeout: Duration) -> Self {
        Self {
            selector: selector.into(),
            state: ElementState::Visible,
            timeout,
        }
    }
}

/// Errors from waiting on a page
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("Timed out after {timeout:?} waiting for '{selector}'")]
    Timeout { selector: String, timeout: Duration },

    #[error("Invalid wait selector '{0}'")]
    InvalidSelector(String),
}

/// A page opened by a `PageSource`
#[async_trait]
pub trait RenderedPage: Send {
    /// URL the page was opened with
    fn url(&self) -> &Url;

    /// Waits until `condition` holds or its timeout elapses
    async fn wait_for(&mut self, condition: &WaitCondition) -> Result<(), WaitError>;

    /// Current HTML of the page
    async fn content(&mut self) -> Result<String, CrawlerError>;

    /// Releases the page. Called exactly once per opened page.
    async fn close(&mut self) -> Result<(), CrawlerError>;
}

/// Opens pages for extraction
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Opens `url`
    ///
    /// # Returns
    ///
    /// * `Ok(Box<dyn RenderedPage>)` - The page is open and must be closed by the caller
    /// * `Err(CrawlerError::PageOpen)` - The page could not be loaded
    async fn open(&self, url: &Url) -> Result<Box<dyn RenderedPage>, CrawlerError>;

    /// Shuts the source down once the crawl is over
    async fn shutdown(&self) -> Result<(), CrawlerError> {
        Ok(())
    }
}

/// Returns true if `html` satisfies the element state for `selector`
///
/// Static HTML has no layout, so an element counts as visible unless it or an
/// ancestor carries `hidden` or an inline `display: none`.
pub fn html_satisfies(html: &str, selector: &Selector, state: ElementState) -> bool {
    let document = Html::parse_document(html);
    let mut matches = document.select(selector);

    match state {
        ElementState::Attached => matches.next().is_some(),
        ElementState::Visible => matches.any(|element| {
            std::iter::once(element)
                .chain(element.ancestors().filter_map(scraper::ElementRef::wrap))
                .all(|node| {
                    let value = node.value();
                    let display_none = value
                        .attr("style")
                        .map(|style| style.replace(' ', "").contains("display:none"))
                        .unwrap_or(false);
                    value.attr("hidden").is_none() && !display_none
                })
        }),
    }
}

/// Page source for server-rendered HTML
///
/// A wait condition that does not hold yet is re-checked by fetching the page
/// again every `poll_interval` until the timeout.
pub struct HttpPageSource {
    client: Client,
    policy: RetryPolicy,
    poll_interval: Duration,
}

impl HttpPageSource {
    pub fn new(client: Client, policy: RetryPolicy, poll_interval: Duration) -> Self {
        Self {
            client,
            policy,
            poll_interval,
        }
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn open(&self, url: &Url) -> Result<Box<dyn RenderedPage>, CrawlerError> {
        let body = fetch_url(&self.client, url.as_str(), &self.policy)
            .await
            .into_body(url.as_str())
            .map(|(_, body)| body)
            .map_err(|e| CrawlerError::PageOpen {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            policy: self.policy.clone(),
            poll_interval: self.poll_interval,
            url: url.clone(),
            body,
        }))
    }
}

struct HttpPage {
    client: Client,
    policy: RetryPolicy,
    poll_interval: Duration,
    url: Url,
    body: String,
}

#[async_trait]
impl RenderedPage for HttpPage {
    fn url(&self) -> &Url {
        &self.url
    }

    async fn wait_for(&mut self, condition: &WaitCondition) -> Result<(), WaitError> {
        let selector = Selector::parse(&condition.selector)
            .map_err(|_| WaitError::InvalidSelector(condition.selector.clone()))?;
        let deadline = Instant::now() + condition.timeout;

        loop {
            if html_satisfies(&self.body, &selector, condition.state) {
                return Ok(());
            }

            if Instant::now() + self.poll_interval > deadline {
                return Err(WaitError::Timeout {
                    selector: condition.selector.clone(),
                    timeout: condition.timeout,
                });
            }

            tokio::time::sleep(self.poll_interval).await;

            // Transient failures keep the previous body; the deadline still applies
            if let Ok((_, body)) = fetch_url(&self.client, self.url.as_str(), &self.policy)
                .await
                .into_body(self.url.as_str())
            {
                self.body = body;
            }
        }
    }

    async fn content(&mut self) -> Result<String, CrawlerError> {
        Ok(self.body.clone())
    }

    async fn close(&mut self) -> Result<(), CrawlerError> {
        self.body.clear();
        Ok(())
    }
}

#[cfg(feature = "browser")]
pub use browser::BrowserPageSource;

#[cfg(feature = "browser")]
mod browser {
    use super::{ElementState, PageSource, RenderedPage, WaitCondition, WaitError};
    use crate::config::FetchConfig;
    use crate::CrawlerError;
    use async_trait::async_trait;
    use chromiumoxide::cdp::browser_protocol::network::SetBlockedUrLsParams;
    use chromiumoxide::{Browser, BrowserConfig, Page};
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::sync::RwLock;
    use tokio::task::JoinHandle;
    use tokio::time::Instant;
    use url::Url;

    /// Request blocking for a tab, None when no pattern is configured
    fn blocking_params(patterns: &[String]) -> Option<SetBlockedUrLsParams> {
        if patterns.is_empty() {
            None
        } else {
            Some(SetBlockedUrLsParams {
                urls: patterns.to_vec(),
            })
        }
    }

    /// Page source backed by a headless Chromium, one tab per page
    ///
    /// Tabs are opened under a read lock so that they open concurrently;
    /// only `shutdown` takes the browser exclusively.
    pub struct BrowserPageSource {
        browser: RwLock<Browser>,
        handler_task: JoinHandle<()>,
        blocked_urls: Vec<String>,
        poll_interval: Duration,
    }

    impl BrowserPageSource {
        /// Launches Chromium
        ///
        /// # Arguments
        ///
        /// * `config` - Fetch settings (headless mode, executable, blocked resources)
        /// * `user_agent` - User-Agent header for every tab
        /// * `poll_interval` - How often a pending wait condition is re-checked
        pub async fn launch(
            config: &FetchConfig,
            user_agent: &str,
            poll_interval: Duration,
        ) -> Result<Self, CrawlerError> {
            let mut builder = BrowserConfig::builder().arg(format!("--user-agent={}", user_agent));
            if !config.headless {
                builder = builder.with_head();
            }
            if let Some(path) = &config.chrome_executable {
                builder = builder.chrome_executable(path);
            }
            let browser_config = builder.build().map_err(CrawlerError::Browser)?;

            let (browser, mut handler) = Browser::launch(browser_config)
                .await
                .map_err(|e| CrawlerError::Browser(format!("Failed to launch browser: {}", e)))?;

            let handler_task = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(e) = event {
                        tracing::warn!("Browser handler error: {:?}", e);
                    }
                }
                tracing::debug!("Browser handler task ended");
            });

            tracing::info!("Launched Chromium (headless: {})", config.headless);

            Ok(Self {
                browser: RwLock::new(browser),
                handler_task,
                blocked_urls: config.block_resources.clone(),
                poll_interval,
            })
        }
    }

    #[async_trait]
    impl PageSource for BrowserPageSource {
        async fn open(&self, url: &Url) -> Result<Box<dyn RenderedPage>, CrawlerError> {
            let open_error = |e: chromiumoxide::error::CdpError| CrawlerError::PageOpen {
                url: url.to_string(),
                message: e.to_string(),
            };

            // Blocking has to be in place before the navigation starts
            let page = self
                .browser
                .read()
                .await
                .new_page("about:blank")
                .await
                .map_err(open_error)?;
            let mut rendered = BrowserPage {
                page: Some(page),
                url: url.clone(),
                poll_interval: self.poll_interval,
            };

            let navigated = async {
                let page = rendered.page()?;
                if let Some(params) = blocking_params(&self.blocked_urls) {
                    if let Err(e) = page.execute(params).await {
                        tracing::warn!("Failed to configure resource blocking: {}", e);
                    }
                }
                page.goto(url.as_str()).await.map_err(open_error)?;
                Ok::<(), CrawlerError>(())
            }
            .await;

            if let Err(e) = navigated {
                if let Err(close_error) = rendered.close().await {
                    tracing::warn!("Failed to close page {}: {}", url, close_error);
                }
                return Err(e);
            }

            Ok(Box::new(rendered))
        }

        async fn shutdown(&self) -> Result<(), CrawlerError> {
            let mut browser = self.browser.write().await;
            browser
                .close()
                .await
                .map_err(|e| CrawlerError::Browser(e.to_string()))?;
            if let Err(e) = browser.wait().await {
                tracing::warn!("Failed to wait for the browser to exit: {}", e);
            }
            self.handler_task.abort();
            Ok(())
        }
    }

    struct BrowserPage {
        page: Option<Page>,
        url: Url,
        poll_interval: Duration,
    }

    impl BrowserPage {
        fn page(&self) -> Result<&Page, CrawlerError> {
            self.page
                .as_ref()
                .ok_or_else(|| CrawlerError::Browser(format!("Page {} already closed", self.url)))
        }

        async fn holds(&self, condition: &WaitCondition) -> bool {
            let Ok(page) = self.page() else {
                return false;
            };

            match condition.state {
                ElementState::Attached => page.find_element(condition.selector.as_str()).await.is_ok(),
                ElementState::Visible => {
                    let selector = match serde_json::to_string(&condition.selector) {
                        Ok(selector) => selector,
                        Err(_) => return false,
                    };
                    let script = format!(
                        "(() => {{ const el = document.querySelector({}); \
                         if (!el) return false; \
                         const style = window.getComputedStyle(el); \
                         const rect = el.getBoundingClientRect(); \
                         return style.visibility !== 'hidden' && style.display !== 'none' \
                         && rect.width > 0 && rect.height > 0; }})()",
                        selector
                    );
                    match page.evaluate(script.as_str()).await {
                        Ok(result) => result.value().and_then(|v| v.as_bool()).unwrap_or(false),
                        Err(_) => false,
                    }
                }
            }
        }
    }

    #[async_trait]
    impl RenderedPage for BrowserPage {
        fn url(&self) -> &Url {
            &self.url
        }

        async fn wait_for(&mut self, condition: &WaitCondition) -> Result<(), WaitError> {
            let deadline = Instant::now() + condition.timeout;

            loop {
                if self.holds(condition).await {
                    return Ok(());
                }
                if Instant::now() + self.poll_interval > deadline {
                    return Err(WaitError::Timeout {
                        selector: condition.selector.clone(),
                        timeout: condition.timeout,
                    });
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        async fn content(&mut self) -> Result<String, CrawlerError> {
            self.page()?
                .content()
                .await
                .map_err(|e| CrawlerError::PageContent {
                    url: self.url.to_string(),
                    message: e.to_string(),
                })
        }

        async fn close(&mut self) -> Result<(), CrawlerError> {
            match self.page.take() {
                Some(page) => page
                    .close()
                    .await
                    .map_err(|e| CrawlerError::Browser(e.to_string())),
                None => Ok(()),
            }
        }
    }

}
