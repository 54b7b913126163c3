//! Configuration module for the crawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional; missing keys fall back to the defaults tuned for
//! kinobox.cz.
//!
//! # Example
//!
//! ```no_run
//! use kinobox_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawler.toml")).unwrap();
//! println!("Movies in flight: {}", config.crawler.max_concurrent_movies);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ControlConfig, CrawlerConfig, FetchConfig, OutputConfig, PaginationConfig, Renderer,
    SelectorConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, load_or_default};
pub use validation::validate;
