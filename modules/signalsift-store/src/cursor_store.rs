//! Per-source ingestion cursors.
//!
//! A cursor is advanced only after the mentions it unlocks are durably
//! clustered. A crash between fetch and commit leaves the prior value, so
//! the next run re-fetches from the same position (at-least-once; the
//! clusterer's mention key absorbs the re-delivery).

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::warn;

use signalsift_common::{Cursor, SiftError};

pub trait CursorStore: Send + Sync {
    /// Last committed position for a source, or None on first run.
    fn read(&self, source_id: &str) -> Result<Option<Cursor>, SiftError>;

    /// Durably record a new position. Atomic with respect to `read`: a
    /// crashed commit never leaves a torn cursor.
    fn commit(&self, source_id: &str, position: &str) -> Result<Cursor, SiftError>;

    /// Explicitly drop a source's cursor (the only deletion path).
    /// Returns whether a cursor existed.
    fn reset(&self, source_id: &str) -> Result<bool, SiftError>;

    /// All committed cursors, for status reporting.
    fn all(&self) -> Result<Vec<Cursor>, SiftError>;
}

/// One JSON file holding every source's cursor, rewritten atomically on each
/// commit via a same-directory temp file and rename.
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Conventional location inside a data directory.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("cursors.json"))
    }

    /// A missing or unreadable file reads as "no cursors committed yet":
    /// first-run behavior, never a hard failure.
    fn load(&self) -> BTreeMap<String, Cursor> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return BTreeMap::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(cursors) => cursors,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "Cursor file unreadable, treating as empty");
                BTreeMap::new()
            }
        }
    }

    fn save(&self, cursors: &BTreeMap<String, Cursor>) -> Result<(), SiftError> {
        write_json_atomic(&self.path, cursors)
    }
}

impl CursorStore for FileCursorStore {
    fn read(&self, source_id: &str) -> Result<Option<Cursor>, SiftError> {
        Ok(self.load().get(source_id).cloned())
    }

    fn commit(&self, source_id: &str, position: &str) -> Result<Cursor, SiftError> {
        let mut cursors = self.load();
        let cursor = Cursor {
            source_id: source_id.to_string(),
            position: position.to_string(),
            committed_at: Utc::now(),
        };
        cursors.insert(source_id.to_string(), cursor.clone());
        self.save(&cursors).map_err(|err| SiftError::CursorCommit {
            source_id: source_id.to_string(),
            reason: err.to_string(),
        })?;
        Ok(cursor)
    }

    fn reset(&self, source_id: &str) -> Result<bool, SiftError> {
        let mut cursors = self.load();
        let existed = cursors.remove(source_id).is_some();
        if existed {
            self.save(&cursors)?;
        }
        Ok(existed)
    }

    fn all(&self) -> Result<Vec<Cursor>, SiftError> {
        Ok(self.load().into_values().collect())
    }
}

/// Serialize to a temp file in the target's directory, then rename into
/// place. Rename is atomic on the same filesystem, so readers only ever see
/// the previous or the new complete file.
pub(crate) fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), SiftError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| SiftError::Store(e.to_string()))?;
    let json =
        serde_json::to_string_pretty(value).map_err(|e| SiftError::Store(e.to_string()))?;
    let mut tmp =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| SiftError::Store(e.to_string()))?;
    tmp.write_all(json.as_bytes())
        .map_err(|e| SiftError::Store(e.to_string()))?;
    tmp.persist(path).map_err(|e| SiftError::Store(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FileCursorStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCursorStore::in_dir(dir.path());
        (dir, store)
    }

    #[test]
    fn first_run_reads_none() {
        let (_dir, store) = store();
        assert_eq!(store.read("newsletter:hf").unwrap(), None);
    }

    #[test]
    fn commit_then_read_round_trips() {
        let (_dir, store) = store();
        store.commit("newsletter:hf", "page-token-42").unwrap();
        let cursor = store.read("newsletter:hf").unwrap().unwrap();
        assert_eq!(cursor.position, "page-token-42");
        assert_eq!(cursor.source_id, "newsletter:hf");
    }

    #[test]
    fn commit_overwrites_only_that_source() {
        let (_dir, store) = store();
        store.commit("a", "1").unwrap();
        store.commit("b", "7").unwrap();
        store.commit("a", "2").unwrap();
        assert_eq!(store.read("a").unwrap().unwrap().position, "2");
        assert_eq!(store.read("b").unwrap().unwrap().position, "7");
    }

    #[test]
    fn uncommitted_source_stays_at_prior_value() {
        let (_dir, store) = store();
        store.commit("a", "1").unwrap();
        // A failed run never calls commit — reading again reproduces the
        // same resume point.
        assert_eq!(store.read("a").unwrap().unwrap().position, "1");
    }

    #[test]
    fn reset_deletes_one_cursor() {
        let (_dir, store) = store();
        store.commit("a", "1").unwrap();
        store.commit("b", "2").unwrap();
        assert!(store.reset("a").unwrap());
        assert!(!store.reset("a").unwrap());
        assert_eq!(store.read("a").unwrap(), None);
        assert_eq!(store.read("b").unwrap().unwrap().position, "2");
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("cursors.json"), "{not json").unwrap();
        assert_eq!(store.read("a").unwrap(), None);
        // And commits recover the file.
        store.commit("a", "1").unwrap();
        assert_eq!(store.read("a").unwrap().unwrap().position, "1");
    }

    #[test]
    fn all_lists_every_cursor() {
        let (_dir, store) = store();
        store.commit("a", "1").unwrap();
        store.commit("b", "2").unwrap();
        let mut sources: Vec<String> = store.all().unwrap().into_iter().map(|c| c.source_id).collect();
        sources.sort();
        assert_eq!(sources, vec!["a", "b"]);
    }
}
