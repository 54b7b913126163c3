/// Movie state definitions for tracking crawl progress
///
/// This module defines all states a movie can be in during the crawl process.
use std::fmt;

/// Represents the current state of a movie in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovieState {
    // ===== Active States =====
    /// Detail URL is known but the movie has not been started
    Discovered,

    /// Detail page is being fetched
    Fetching,

    /// Comment pages are being followed
    Paginating,

    // ===== Terminal Success States =====
    /// Record emitted after the last comments page
    Completed,

    /// Record emitted after pagination was cut short (wait timeout or fetch failure)
    Partial,

    // ===== Terminal Error States =====
    /// Detail page or first comments page could not be fetched; nothing emitted
    Failed,
}

impl MovieState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if this is an active state (movie may still be processed)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Discovered | Self::Fetching | Self::Paginating)
    }

    /// Returns true if a record was emitted for the movie
    pub fn is_emitted(&self) -> bool {
        matches!(self, Self::Completed | Self::Partial)
    }

    /// Converts the movie state to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Fetching => "fetching",
            Self::Paginating => "paginating",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    /// Parses a movie state from a database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "discovered" => Some(Self::Discovered),
            "fetching" => Some(Self::Fetching),
            "paginating" => Some(Self::Paginating),
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible movie states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Discovered,
            Self::Fetching,
            Self::Paginating,
            Self::Completed,
            Self::Partial,
            Self::Failed,
        ]
    }
}

impl fmt::Display for MovieState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
