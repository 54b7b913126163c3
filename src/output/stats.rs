//! Statistics generation from the job directory database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::output::traits::CrawlSummary;
use crate::state::MovieState;
use crate::storage::Storage;
use crate::CrawlerError;
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Total number of movies discovered
    pub total_movies: u64,

    /// Count of movies by state
    pub movies_by_state: HashMap<MovieState, u64>,

    /// Comments in all emitted records
    pub total_comments: u64,

    /// How emitted movies finished their pagination (reason -> count)
    pub finish_reasons: HashMap<String, u64>,
}

impl CrawlStatistics {
    /// Number of movies whose record was emitted
    pub fn emitted_movies(&self) -> u64 {
        MovieState::all_states()
            .into_iter()
            .filter(MovieState::is_emitted)
            .filter_map(|state| self.movies_by_state.get(&state))
            .sum()
    }

    /// Returns the share of terminal movies that were emitted, as a percentage
    pub fn success_rate(&self) -> f64 {
        let terminal: u64 = self
            .movies_by_state
            .iter()
            .filter(|(state, _)| state.is_terminal())
            .map(|(_, count)| count)
            .sum();
        if terminal == 0 {
            return 0.0;
        }
        (self.emitted_movies() as f64 / terminal as f64) * 100.0
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(CrawlerError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics, CrawlerError> {
    let mut movies_by_state = HashMap::new();
    for state in MovieState::all_states() {
        let count = storage.count_movies_by_state(state)?;
        if count > 0 {
            movies_by_state.insert(state, count);
        }
    }

    Ok(CrawlStatistics {
        total_movies: storage.count_total_movies()?,
        movies_by_state,
        total_comments: storage.count_comments()?,
        finish_reasons: storage.get_finish_reason_summary()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Total movies discovered: {}", stats.total_movies);
    println!("  Records emitted: {}", stats.emitted_movies());
    println!("  Comments collected: {}", stats.total_comments);
    println!();

    println!("Movies by State:");
    let mut state_counts: Vec<_> = stats.movies_by_state.iter().collect();
    state_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (state, count) in state_counts {
        let percentage = if stats.total_movies > 0 {
            (*count as f64 / stats.total_movies as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    println!();

    if !stats.finish_reasons.is_empty() {
        println!("Pagination Finish Reasons:");
        let mut reasons: Vec<_> = stats.finish_reasons.iter().collect();
        reasons.sort_by(|a, b| b.1.cmp(a.1));

        for (reason, count) in reasons {
            println!("  {}: {}", reason, count);
        }
        println!();
    }

    println!("Success Rate: {:.1}%", stats.success_rate());
}

/// Prints run metadata followed by the statistics
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== Run {} ({}) ===\n", summary.run_id, summary.spider);
    println!("  Status: {}", summary.status);
    println!("  Started: {}", summary.started_at);
    if let Some(finished) = &summary.finished_at {
        println!("  Finished: {}", finished);
    }
    if let Some(seconds) = summary.duration_seconds {
        println!("  Duration: {}s", seconds);
    }
    println!("  Config hash: {}", summary.config_hash);
    println!();

    print_statistics(&summary.statistics);
}
