//! Ranking & filter — which items are worth surfacing.
//!
//! Corroboration is distinct sources, not mention volume. Items below the
//! threshold are filtered from the output but stay in persisted state; they
//! can clear the bar in a later run as mentions accumulate.

use signalsift_common::{Config, Item};

#[derive(Debug, Clone)]
pub struct RankingPolicy {
    /// Minimum distinct sources before an item is surfaced.
    pub min_distinct_sources: usize,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            min_distinct_sources: 2,
        }
    }
}

impl From<&Config> for RankingPolicy {
    fn from(config: &Config) -> Self {
        Self {
            min_distinct_sources: config.min_corroborating_sources,
        }
    }
}

impl RankingPolicy {
    /// Retain items meeting the corroboration minimum, ordered by distinct
    /// sources descending, then first_seen_at ascending (earlier-flagged
    /// items surface first), then item id.
    pub fn rank<'a>(&self, items: impl IntoIterator<Item = &'a Item>) -> Vec<&'a Item> {
        let mut ranked: Vec<&Item> = items
            .into_iter()
            .filter(|item| item.corroboration() >= self.min_distinct_sources)
            .collect();
        ranked.sort_by(|a, b| {
            b.corroboration()
                .cmp(&a.corroboration())
                .then(a.first_seen_at.cmp(&b.first_seen_at))
                .then(a.item_id.cmp(&b.item_id))
        });
        ranked
    }
}
