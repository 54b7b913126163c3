//! Local control channel
//!
//! A line-oriented TCP console bound to `control.host:control.port`. A client
//! authenticates with the configured username and password and can then stop
//! the crawl or ask for its progress.
//!
//! ```text
//! Username: scrapy
//! Password: 1111
//! >>> status
//! discovered: 120, in flight: 8, emitted: 64, failed: 1
//! >>> stop
//! Stopping crawl
//! ```

mod client;
mod server;

pub use client::{send_command, send_stop};
pub use server::{Command, ControlServer};

use thiserror::Error;

pub const USERNAME_PROMPT: &str = "Username: ";
pub const PASSWORD_PROMPT: &str = "Password: ";
pub const COMMAND_PROMPT: &str = ">>> ";

/// Sent instead of the command prompt when the credentials are wrong
pub const AUTH_FAILED: &str = "Authentication failed";

/// Errors of the control channel
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Failed to bind control channel to {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("Failed to connect to control channel at {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    #[error("Control channel rejected the credentials")]
    AuthenticationFailed,

    #[error("Control channel did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for control channel operations
pub type ControlResult<T> = Result<T, ControlError>;
