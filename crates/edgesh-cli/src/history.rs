//! Command history: append-only, size-bounded, consecutive-duplicate
//! collapsing, persisted to a dotfile between sessions.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_SIZE: usize = 1000;

pub struct HistoryStore {
    path: PathBuf,
    max_size: usize,
    entries: Vec<String>,
}

impl HistoryStore {
    pub fn new(path: PathBuf, max_size: usize) -> Self {
        HistoryStore {
            path,
            max_size,
            entries: Vec::new(),
        }
    }

    /// Loads history from disk, keeping the most recent `max_size` lines.
    /// A missing file is an empty history, not an error.
    pub fn load(&mut self) -> std::io::Result<()> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        self.entries = text.lines().map(str::to_string).collect();
        if self.entries.len() > self.max_size {
            let excess = self.entries.len() - self.max_size;
            self.entries.drain(..excess);
        }
        Ok(())
    }

    /// Writes one entry per line, creating parent directories as needed.
    pub fn save(&self) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let mut file = fs::File::create(&self.path)?;
        for entry in &self.entries {
            writeln!(file, "{entry}")?;
        }
        Ok(())
    }

    /// Appends a line. Empty lines and repeats of the last entry are
    /// dropped; the oldest entry is evicted once the bound is hit.
    pub fn add(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        if self.entries.last().map(String::as_str) == Some(line) {
            return;
        }
        self.entries.push(line.to_string());
        if self.entries.len() > self.max_size {
            self.entries.remove(0);
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod history_tests {
    use super::*;
    use proptest::prelude::*;

    fn store() -> HistoryStore {
        HistoryStore::new(PathBuf::from("unused"), 3)
    }

    #[test]
    fn add_skips_empty_and_consecutive_duplicates() {
        let mut h = store();
        h.add("");
        h.add("x");
        h.add("x");
        assert_eq!(h.entries(), ["x"]);
        h.add("y");
        h.add("x");
        assert_eq!(h.entries(), ["x", "y", "x"]);
    }

    #[test]
    fn add_evicts_oldest_beyond_bound() {
        let mut h = store();
        for line in ["a", "b", "c", "d"] {
            h.add(line);
        }
        assert_eq!(h.entries(), ["b", "c", "d"]);
    }

    #[test]
    fn load_missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = HistoryStore::new(dir.path().join("nope"), 10);
        h.load().unwrap();
        assert!(h.entries().is_empty());
    }

    #[test]
    fn save_and_load_round_trip_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep").join("hist");
        let mut h = HistoryStore::new(path.clone(), 10);
        h.add("one");
        h.add("two");
        h.save().unwrap();

        let mut reloaded = HistoryStore::new(path, 10);
        reloaded.load().unwrap();
        assert_eq!(reloaded.entries(), ["one", "two"]);
    }

    #[test]
    fn load_truncates_to_most_recent_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hist");
        std::fs::write(&path, "1\n2\n3\n4\n5\n").unwrap();
        let mut h = HistoryStore::new(path, 3);
        h.load().unwrap();
        assert_eq!(h.entries(), ["3", "4", "5"]);
    }

    proptest! {
        // Distinct lines beyond the bound always leave exactly the most
        // recent `max` entries, in order.
        #[test]
        fn bound_holds_for_distinct_lines(n in 1usize..200, max in 1usize..50) {
            let mut h = HistoryStore::new(PathBuf::from("unused"), max);
            let lines: Vec<String> = (0..n).map(|i| format!("cmd-{i}")).collect();
            for line in &lines {
                h.add(line);
            }
            let expect_len = n.min(max);
            prop_assert_eq!(h.entries().len(), expect_len);
            prop_assert_eq!(h.entries(), &lines[n - expect_len..]);
        }
    }
}
