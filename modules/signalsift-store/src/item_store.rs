//! Persistence for the cluster state (items + merge audit log).
//!
//! The orchestrator saves the snapshot before committing any cursor
//! (write-ahead-of-commit ordering): if the save fails, no cursor moves.

use std::path::{Path, PathBuf};

use tracing::warn;

use signalsift_common::SiftError;
use signalsift_engine::ClusterSnapshot;

use crate::cursor_store::write_json_atomic;

pub struct FileItemStore {
    path: PathBuf,
}

impl FileItemStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("items.json"))
    }

    /// Load the persisted snapshot; a missing file is an empty collection
    /// (first run). An unreadable file is also treated as empty, with a
    /// warning — re-clustering from re-fetched mentions is safe because
    /// ingestion is idempotent.
    pub fn load(&self) -> ClusterSnapshot {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return ClusterSnapshot::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "Item snapshot unreadable, starting empty");
                ClusterSnapshot::default()
            }
        }
    }

    /// Durably write the snapshot (atomic temp-file + rename).
    pub fn save(&self, snapshot: &ClusterSnapshot) -> Result<(), SiftError> {
        write_json_atomic(&self.path, snapshot)
    }
}
