//! Run orchestration: drives one ingestion cycle across all sources.
//!
//! Fetches run concurrently per source; clustering is a single sequential
//! path afterwards; cursors commit only after the clustered state is durably
//! persisted. One bounded batch per invocation, no background work.

pub mod run_log;
pub mod runner;
pub mod stats;
pub mod traits;

pub use run_log::{EventKind, RunLog};
pub use runner::{RunOrchestrator, RunSummary, SourceReport, SourceStatus};
pub use stats::RunStats;
pub use traits::{FetchBatch, SourceAdapter, SourceFetchError};
