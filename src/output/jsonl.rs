//! JSON-lines item feed

use crate::model::MovieRecord;
use crate::output::traits::{ItemSink, OutputResult};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Appends one JSON object per movie to a file
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Opens the feed for appending, creating it and its parent directories
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the `.jsonl` feed
    ///
    /// # Returns
    ///
    /// * `Ok(JsonLinesSink)` - Feed opened
    /// * `Err(OutputError)` - Failed to create the directory or open the file
    pub fn create(path: &Path) -> OutputResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ItemSink for JsonLinesSink {
    fn write_item(&self, movie: &MovieRecord) -> OutputResult<()> {
        let mut writer = self.writer.lock().unwrap();
        serde_json::to_writer(&mut *writer, movie)?;
        writer.write_all(b"\n")?;
        // One record per line must survive an abrupt stop
        writer.flush()?;
        Ok(())
    }

    fn flush(&self) -> OutputResult<()> {
        self.writer.lock().unwrap().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CommentRecord;
    use tempfile::TempDir;

    fn movie(title: &str, comments: usize) -> MovieRecord {
        MovieRecord {
            title: Some(title.to_string()),
            comments: (0..comments)
                .map(|i| CommentRecord {
                    user: Some(format!("user{}", i)),
                    published: None,
                    rating: "N/A".to_string(),
                    text: None,
                    likes: None,
                })
                .collect(),
            ..MovieRecord::default()
        }
    }

    #[test]
    fn test_writes_one_line_per_item() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("kinobox_items.jsonl");

        let sink = JsonLinesSink::create(&path).unwrap();
        sink.write_item(&movie("Pelíšky", 2)).unwrap();
        sink.write_item(&movie("Obecná škola", 0)).unwrap();
        sink.flush().unwrap();

        let content = fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: MovieRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.title.as_deref(), Some("Pelíšky"));
        assert_eq!(first.comments.len(), 2);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["comments"], serde_json::json!([]));
        assert!(second["director"].is_null());
    }

    #[test]
    fn test_appends_to_existing_feed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("items.jsonl");

        JsonLinesSink::create(&path)
            .unwrap()
            .write_item(&movie("A", 0))
            .unwrap();
        JsonLinesSink::create(&path)
            .unwrap()
            .write_item(&movie("B", 0))
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }
}
