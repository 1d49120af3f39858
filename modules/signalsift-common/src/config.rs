use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
///
/// Thresholds are tunable defaults, not contracts.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the cursor file, item snapshot, and run logs.
    pub data_dir: PathBuf,

    /// Minimum distinct sources before an item is worth surfacing.
    pub min_corroborating_sources: usize,

    /// Token-set overlap threshold for fuzzy title/excerpt matching.
    pub title_similarity_threshold: f64,

    /// Only items seen within this many days are fuzzy-match candidates.
    /// Unset means all items are considered.
    pub resolver_recent_window_days: Option<i64>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if a value fails to parse.
    pub fn from_env() -> Self {
        Self {
            data_dir: env::var("SIGNALSIFT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            min_corroborating_sources: env::var("MIN_CORROBORATING_SOURCES")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .expect("MIN_CORROBORATING_SOURCES must be a number"),
            title_similarity_threshold: env::var("TITLE_SIMILARITY_THRESHOLD")
                .unwrap_or_else(|_| "0.85".to_string())
                .parse()
                .expect("TITLE_SIMILARITY_THRESHOLD must be a number"),
            resolver_recent_window_days: env::var("RESOLVER_RECENT_WINDOW_DAYS")
                .ok()
                .map(|v| v.parse().expect("RESOLVER_RECENT_WINDOW_DAYS must be a number")),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            min_corroborating_sources: 2,
            title_similarity_threshold: 0.85,
            resolver_recent_window_days: None,
        }
    }
}
