use crate::model::CommentRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregated movie record: detail-page metadata plus every comment page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieRecord {
    pub title: Option<String>,
    pub title_eng: Option<String>,
    pub year: Option<String>,
    pub duration: Option<String>,

    /// Aggregate score as shown on the page, e.g. `"78%"`
    pub rating: Option<String>,
    pub description: Option<String>,
    pub main_actors: Vec<String>,
    pub director: Option<String>,
    pub screenwriter: Option<String>,
    pub music: Option<String>,

    /// Comments in page order, then DOM order within a page
    #[serde(default)]
    pub comments: Vec<CommentRecord>,
}

impl MovieRecord {
    /// Title used in log lines; falls back to a placeholder for untitled pages
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("<untitled>")
    }

    /// Copies the metadata and attaches the given comment sequence
    pub fn with_comments(&self, comments: Vec<CommentRecord>) -> Self {
        Self {
            comments,
            ..self.clone()
        }
    }
}

/// Key under which a movie's comments are accumulated
///
/// The title is the movie's identity in emitted records. The detail page URL
/// keeps two different movies that share a title from sharing an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MovieKey {
    pub title: String,
    pub detail_url: String,
}

impl MovieKey {
    pub fn new(title: impl Into<String>, detail_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail_url: detail_url.into(),
        }
    }

    /// Builds the key for a movie extracted from the given detail page
    pub fn for_movie(movie: &MovieRecord, detail_url: &str) -> Self {
        Self::new(movie.title.clone().unwrap_or_default(), detail_url)
    }
}

impl fmt::Display for MovieKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.detail_url)
    }
}
