//! Run log — timeline of every action taken during a run.
//!
//! Each run writes one JSON file into `<data_dir>/runs/` with the stats and
//! the ordered event list. Every rejected mention and failed source shows up
//! here — nothing is silently dropped.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use signalsift_common::SiftError;

use crate::stats::RunStats;

// ---------------------------------------------------------------------------
// RunLog
// ---------------------------------------------------------------------------

pub struct RunLog {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    events: Vec<RunEvent>,
    seq: u32,
}

#[derive(Serialize, Deserialize)]
pub struct RunEvent {
    pub seq: u32,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    CursorRead {
        source_id: String,
        position: Option<String>,
    },
    FetchCompleted {
        source_id: String,
        records: u32,
        new_position: String,
    },
    FetchFailed {
        source_id: String,
        reason: String,
        salvaged: u32,
    },
    MentionRejected {
        source_id: String,
        reason: String,
    },
    MentionClustered {
        source_id: String,
        item_id: String,
        action: String,
    },
    ItemsMerged {
        surviving: String,
        absorbed: String,
    },
    RankingComplete {
        surfaced: u32,
        total_items: u32,
    },
    SnapshotSaved {
        items: u32,
    },
    CursorCommitted {
        source_id: String,
        position: String,
    },
    CursorCommitFailed {
        source_id: String,
        reason: String,
    },
}

impl RunLog {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            events: Vec::new(),
            seq: 0,
        }
    }

    pub fn log(&mut self, kind: EventKind) {
        self.events.push(RunEvent {
            seq: self.seq,
            ts: Utc::now(),
            kind,
        });
        self.seq += 1;
    }

    pub fn events(&self) -> &[RunEvent] {
        &self.events
    }

    /// Write the run log as JSON under `<data_dir>/runs/`.
    pub fn save_to_dir(&self, data_dir: &Path, stats: &RunStats) -> Result<PathBuf, SiftError> {
        let dir = data_dir.join("runs");
        std::fs::create_dir_all(&dir).map_err(|e| SiftError::Store(e.to_string()))?;
        let path = dir.join(format!("run-{}.json", self.run_id));

        let record = SerializedRun {
            run_id: &self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            stats,
            events: &self.events,
        };
        let json =
            serde_json::to_string_pretty(&record).map_err(|e| SiftError::Store(e.to_string()))?;
        std::fs::write(&path, json).map_err(|e| SiftError::Store(e.to_string()))?;

        info!(run_id = %self.run_id, events = self.events.len(), path = %path.display(), "Run log saved");
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Serialization wrapper
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SerializedRun<'a> {
    run_id: &'a str,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    stats: &'a RunStats,
    events: &'a [RunEvent],
}
