use thiserror::Error;

/// Error taxonomy for a sift run.
///
/// `Malformed` and `SourceFetch` are recovered in place (skip the record,
/// isolate the source). `CursorCommit` and `Store` fail the commit phase for
/// the affected source only. `ClusterInvariant` means a logic defect and is
/// fatal to the run.
#[derive(Error, Debug)]
pub enum SiftError {
    #[error("Malformed record from {source_id}: {reason}")]
    Malformed { source_id: String, reason: String },

    #[error("Fetch failed for source {source_id}: {reason}")]
    SourceFetch { source_id: String, reason: String },

    #[error("Cursor commit failed for source {source_id}: {reason}")]
    CursorCommit { source_id: String, reason: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Cluster invariant violated: {0}")]
    ClusterInvariant(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
