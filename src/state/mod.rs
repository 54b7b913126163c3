//! State module for tracking crawl progress
//!
//! - `MovieState`: lifecycle of one movie (discovered, fetching, paginating, completed, etc.)

mod movie_state;

pub use movie_state::MovieState;
