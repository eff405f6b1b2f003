//! Spoken-post history.
//!
//! Stores one record per spoken post as daily JSONL files in
//! ~/.board-speaker-history/{date}.jsonl. The reader uses it to resume a
//! thread where an earlier run stopped.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpokenRecord {
    pub timestamp: String,
    pub thread: String,
    pub number: i32,
    pub author: String,
    pub voice: String,
    pub chars: usize,
}

impl SpokenRecord {
    pub fn now(thread: &str, number: i32, author: &str, voice: &str, chars: usize) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
            thread: thread.to_string(),
            number,
            author: author.to_string(),
            voice: voice.to_string(),
            chars,
        }
    }
}

pub struct History {
    dir: PathBuf,
}

impl History {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// History under the user's home directory.
    pub fn in_home() -> Option<Self> {
        dirs::home_dir().map(|h| Self::new(h.join(".board-speaker-history")))
    }

    fn file(&self, date: &str) -> PathBuf {
        self.dir.join(format!("{date}.jsonl"))
    }

    /// Append a record to the file for its date. Failures are logged and dropped.
    pub fn save(&self, record: &SpokenRecord) {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!("Failed to create history dir: {e}");
            return;
        }

        let date = record.timestamp.get(..10).unwrap_or("unknown");
        let path = self.file(date);
        let mut file = match fs::OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Failed to open history file {}: {e}", path.display());
                return;
            }
        };

        match serde_json::to_string(record) {
            Ok(line) => {
                if let Err(e) = writeln!(file, "{line}") {
                    warn!("Failed to write history record: {e}");
                } else {
                    debug!("Saved post #{} to {}", record.number, path.display());
                }
            }
            Err(e) => warn!("Failed to serialize history record: {e}"),
        }
    }

    pub fn load(&self, date: &str) -> Vec<SpokenRecord> {
        let Ok(contents) = fs::read_to_string(self.file(date)) else {
            return Vec::new();
        };
        contents
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    pub fn list_dates(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut dates: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                name.strip_suffix(".jsonl").map(str::to_string)
            })
            .collect();
        dates.sort();
        dates
    }

    /// Highest post number spoken for `thread` across all days.
    pub fn last_spoken_number(&self, thread: &str) -> Option<i32> {
        self.list_dates()
            .iter()
            .flat_map(|date| self.load(date))
            .filter(|r| r.thread == thread)
            .map(|r| r.number)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timestamp: &str, thread: &str, number: i32) -> SpokenRecord {
        SpokenRecord {
            timestamp: timestamp.into(),
            thread: thread.into(),
            number,
            author: "Anon".into(),
            voice: "jf_alpha".into(),
            chars: 5,
        }
    }

    #[test]
    fn saves_and_loads_by_date() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("history"));

        history.save(&record("2024-01-01T10:00:00.000", "a.dat", 1));
        history.save(&record("2024-01-01T10:01:00.000", "a.dat", 2));
        history.save(&record("2024-01-02T09:00:00.000", "b.dat", 7));

        assert_eq!(history.list_dates(), vec!["2024-01-01", "2024-01-02"]);
        assert_eq!(history.load("2024-01-01").len(), 2);
        assert_eq!(history.load("2024-01-02")[0], record("2024-01-02T09:00:00.000", "b.dat", 7));
        assert!(history.load("2023-12-31").is_empty());
    }

    #[test]
    fn last_spoken_is_per_thread() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().to_path_buf());
        history.save(&record("2024-01-01T10:00:00.000", "a.dat", 5));
        history.save(&record("2024-01-02T10:00:00.000", "a.dat", 9));
        history.save(&record("2024-01-02T10:00:00.000", "b.dat", 30));

        assert_eq!(history.last_spoken_number("a.dat"), Some(9));
        assert_eq!(history.last_spoken_number("b.dat"), Some(30));
        assert_eq!(history.last_spoken_number("c.dat"), None);
    }
}
