use crate::config::types::{
    Config, ControlConfig, CrawlerConfig, FetchConfig, OutputConfig, PaginationConfig, Renderer,
};
use crate::extract::SiteSelectors;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_pagination_config(&config.pagination)?;
    validate_fetch_config(&config.fetch)?;
    validate_output_config(&config.output)?;
    validate_control_config(&config.control)?;

    if config.user_agent.value.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent value cannot be empty".to_string(),
        ));
    }

    // Compiling reports the first selector that does not parse
    SiteSelectors::compile(&config.selectors)?;

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_movies < 1 || config.max_concurrent_movies > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-movies must be between 1 and 100, got {}",
            config.max_concurrent_movies
        )));
    }

    if config.max_concurrent_pages_open < config.max_concurrent_movies {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-pages-open ({}) must be >= max-concurrent-movies ({})",
            config.max_concurrent_pages_open, config.max_concurrent_movies
        )));
    }

    if config.retry_times > 20 {
        return Err(ConfigError::Validation(format!(
            "retry-times must be <= 20, got {}",
            config.retry_times
        )));
    }

    for code in &config.retry_http_codes {
        if !(100..=599).contains(code) {
            return Err(ConfigError::Validation(format!(
                "retry-http-codes contains invalid status code {}",
                code
            )));
        }
    }

    if config.request_timeout == 0 {
        return Err(ConfigError::Validation(
            "request-timeout must be >= 1 second".to_string(),
        ));
    }

    for start_url in &config.start_urls {
        let url = Url::parse(start_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid start URL '{}': {}", start_url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Start URL '{}' must use HTTP or HTTPS",
                start_url
            )));
        }
    }

    Ok(())
}

fn validate_pagination_config(config: &PaginationConfig) -> Result<(), ConfigError> {
    if config.wait_timeout < 100 {
        return Err(ConfigError::Validation(format!(
            "wait-timeout must be >= 100ms, got {}ms",
            config.wait_timeout
        )));
    }

    if config.poll_interval < 10 || config.poll_interval > config.wait_timeout {
        return Err(ConfigError::Validation(format!(
            "poll-interval must be between 10ms and wait-timeout, got {}ms",
            config.poll_interval
        )));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.renderer == Renderer::Browser && !cfg!(feature = "browser") {
        return Err(ConfigError::Validation(
            "renderer = \"browser\" requires building with the `browser` feature".to_string(),
        ));
    }

    if config.block_resources.iter().any(|pattern| pattern.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "block-resources cannot contain empty patterns".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.job_root.trim().is_empty() {
        return Err(ConfigError::Validation(
            "job-root cannot be empty".to_string(),
        ));
    }

    if let Some(path) = &config.items_path {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "items-path cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_control_config(config: &ControlConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    if config.port == 0 {
        return Err(ConfigError::Validation(
            "control port must be non-zero".to_string(),
        ));
    }

    if config.username.is_empty() || config.password.is_empty() {
        return Err(ConfigError::Validation(
            "control username and password cannot be empty".to_string(),
        ));
    }

    Ok(())
}
