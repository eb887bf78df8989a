//! Best-effort persistent ID counters.
//!
//! The domain layer hands out sequential numeric IDs (patient numbers,
//! test codes) from tiny side files, one integer per file, rewritten on
//! every bump. These counters are deliberately not transactional: a
//! failed read or write falls back to 1 at next use instead of failing
//! the caller.

use std::path::{Path, PathBuf};

/// The value a counter falls back to when its file is missing or
/// unreadable.
const RESET_VALUE: u32 = 1;

/// A monotonically increasing u32 persisted in its own file.
pub struct IdCounter {
    path: PathBuf,
    next: u32,
}

impl IdCounter {
    /// Opens a counter backed by `path`, loading the stored value or
    /// falling back to 1.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let next = Self::load(&path);
        Self { path, next }
    }

    /// The value the next call to `bump` will return.
    pub fn peek(&self) -> u32 {
        self.next
    }

    /// Returns the current value and advances the counter, persisting
    /// the new value best-effort.
    pub fn bump(&mut self) -> u32 {
        let value = self.next;
        self.next = self.next.wrapping_add(1).max(RESET_VALUE);
        self.save();
        value
    }

    fn load(path: &Path) -> u32 {
        match std::fs::read(path) {
            Ok(data) if data.len() == 4 => {
                let value = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                value.max(RESET_VALUE)
            }
            _ => RESET_VALUE,
        }
    }

    fn save(&self) {
        let _ = std::fs::write(&self.path, self.next.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_starts_at_one() {
        let dir = tempdir().unwrap();
        let counter = IdCounter::open(dir.path().join("patients_id_counter.dat"));
        assert_eq!(counter.peek(), 1);
    }

    #[test]
    fn test_bump_sequence() {
        let dir = tempdir().unwrap();
        let mut counter = IdCounter::open(dir.path().join("patients_id_counter.dat"));
        assert_eq!(counter.bump(), 1);
        assert_eq!(counter.bump(), 2);
        assert_eq!(counter.bump(), 3);
        assert_eq!(counter.peek(), 4);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tests_code_counter.dat");

        {
            let mut counter = IdCounter::open(&path);
            counter.bump();
            counter.bump();
        }

        let counter = IdCounter::open(&path);
        assert_eq!(counter.peek(), 3);
    }

    #[test]
    fn test_garbage_file_resets_to_one() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counter.dat");
        std::fs::write(&path, b"not a counter").unwrap();

        let counter = IdCounter::open(&path);
        assert_eq!(counter.peek(), 1);
    }

    #[test]
    fn test_unwritable_path_still_counts() {
        let mut counter = IdCounter::open("/nonexistent-dir/counter.dat");
        assert_eq!(counter.bump(), 1);
        assert_eq!(counter.bump(), 2);

        // A fresh open cannot read the failed writes and resets.
        let counter = IdCounter::open("/nonexistent-dir/counter.dat");
        assert_eq!(counter.peek(), 1);
    }
}
