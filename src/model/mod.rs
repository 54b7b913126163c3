//! Scraped item types
//!
//! - `MovieRecord`: one aggregated record per movie, emitted to the item sink
//! - `CommentRecord`: a single user rating/review from a comments page
//! - `MovieKey`: identity under which a movie's comments are accumulated

mod comment;
mod movie;

pub use comment::{CommentRecord, RATING_NOT_AVAILABLE};
pub use movie::{MovieKey, MovieRecord};
