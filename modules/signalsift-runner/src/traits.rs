// Trait abstraction for source adapters.
//
// Transport, pagination, auth, and retry all live behind this seam — the
// orchestrator only sees raw records and opaque positions. Mock adapters
// make run tests deterministic: no network, no external services.

use async_trait::async_trait;

use signalsift_common::RawRecord;

/// One successful fetch: everything new since the given position, plus the
/// position to commit once these records are durably clustered.
#[derive(Debug, Clone)]
pub struct FetchBatch {
    pub records: Vec<RawRecord>,
    /// Opaque resume token, meaningful only to this adapter. Monotonic
    /// within the source; never interpreted by the orchestrator.
    pub new_position: String,
}

/// A fetch that failed, possibly after yielding some records.
///
/// Salvaged records are still clustered this run — the cursor stays put, so
/// the next run re-delivers them and the mention-key dedup absorbs the
/// overlap (at-least-once, never at-most-once).
#[derive(Debug, thiserror::Error)]
#[error("{reason}")]
pub struct SourceFetchError {
    pub reason: String,
    pub partial: Vec<RawRecord>,
}

impl SourceFetchError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            partial: Vec::new(),
        }
    }

    pub fn with_partial(reason: impl Into<String>, partial: Vec<RawRecord>) -> Self {
        Self {
            reason: reason.into(),
            partial,
        }
    }
}

/// One data origin (newsletter, social account, blog). Implementations must
/// be idempotent-safe for re-fetch at the same position; a cancelled or
/// timed-out fetch is reported as a plain failure.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable stream identifier, e.g. "newsletter:huggingface".
    fn source_id(&self) -> &str;

    /// Delimiter this source documents for its author strings.
    fn author_delimiter(&self) -> &str {
        ";"
    }

    /// Fetch raw records newer than `position` (None on first run).
    async fn fetch_since(&self, position: Option<&str>) -> Result<FetchBatch, SourceFetchError>;
}
