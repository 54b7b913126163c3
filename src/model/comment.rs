use serde::{Deserialize, Serialize};

/// Rating placeholder used when the source rating is missing or unparsable
pub const RATING_NOT_AVAILABLE: &str = "N/A";

/// A single user comment from a movie's comments page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    /// Display name of the commenting user
    pub user: Option<String>,

    /// Publication date as shown on the page (free text)
    pub published: Option<String>,

    /// Rating as an integer percentage (`"80%"`) or `"N/A"`
    pub rating: String,

    /// Comment body
    pub text: Option<String>,

    /// Like counter as shown on the page (free text)
    pub likes: Option<String>,
}

impl CommentRecord {
    /// Returns true if the comment carried a usable rating
    pub fn has_rating(&self) -> bool {
        self.rating != RATING_NOT_AVAILABLE
    }
}
