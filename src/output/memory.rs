//! In-memory item sink

use crate::model::MovieRecord;
use crate::output::traits::{ItemSink, OutputResult};
use std::sync::Mutex;

/// Collects finished records in memory, in emission order
#[derive(Debug, Default)]
pub struct MemorySink {
    items: Mutex<Vec<MovieRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record written so far
    pub fn items(&self) -> Vec<MovieRecord> {
        self.items.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ItemSink for MemorySink {
    fn write_item(&self, movie: &MovieRecord) -> OutputResult<()> {
        self.items.lock().unwrap().push(movie.clone());
        Ok(())
    }

    fn flush(&self) -> OutputResult<()> {
        Ok(())
    }
}
