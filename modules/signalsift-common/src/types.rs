use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Identifiers ---

/// A strongly typed external identifier carried by a mention.
///
/// The inner string keeps the casing the source gave us (for display);
/// `canonical()` is the comparison form. Two mentions sharing any canonical
/// identifier always resolve to the same item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ExternalId {
    Doi(String),
    Arxiv(String),
    Url(String),
    Other(String),
}

impl ExternalId {
    /// Parse a raw identifier string from a source record.
    /// Returns None for blank input — absent is absent, not an empty id.
    pub fn parse(raw: &str) -> Option<ExternalId> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let lower = raw.to_lowercase();
        if let Some(rest) = lower.strip_prefix("doi:") {
            return Some(ExternalId::Doi(rest.trim().to_string()));
        }
        if raw.starts_with("10.") && raw.contains('/') {
            return Some(ExternalId::Doi(raw.to_string()));
        }
        if let Some(rest) = lower.strip_prefix("arxiv:") {
            return Some(ExternalId::Arxiv(rest.trim().to_string()));
        }
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return match url::Url::parse(raw) {
                Ok(parsed) => {
                    // arXiv abstract links identify the paper itself
                    if parsed.host_str().is_some_and(|h| h.ends_with("arxiv.org")) {
                        if let Some(id) = parsed.path().strip_prefix("/abs/") {
                            return Some(ExternalId::Arxiv(id.trim_matches('/').to_string()));
                        }
                    }
                    Some(ExternalId::Url(canonical_url(&parsed)))
                }
                Err(_) => Some(ExternalId::Other(raw.to_string())),
            };
        }
        Some(ExternalId::Other(raw.to_string()))
    }

    /// Lowercased, prefixed comparison form. Display casing is untouched.
    pub fn canonical(&self) -> String {
        match self {
            ExternalId::Doi(v) => format!("doi:{}", v.to_lowercase()),
            ExternalId::Arxiv(v) => format!("arxiv:{}", v.to_lowercase()),
            ExternalId::Url(v) => format!("url:{}", v.to_lowercase()),
            ExternalId::Other(v) => format!("other:{}", v.to_lowercase()),
        }
    }
}

/// Canonical URL form: fragment stripped, trailing slash trimmed.
/// The url crate already lowercases scheme and host during parsing.
fn canonical_url(parsed: &url::Url) -> String {
    let mut u = parsed.clone();
    u.set_fragment(None);
    let s = u.to_string();
    s.trim_end_matches('/').to_string()
}

/// Normalize free text for comparison: trim, collapse whitespace, lowercase.
pub fn normalize_for_compare(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Collapse whitespace but keep the original casing (display form).
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// --- Raw records ---

/// What a source adapter yields, before normalization. Every field except
/// the identifiers list is optional; adapters must not fill absences with
/// empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    pub title: Option<String>,
    /// Unsplit author string; the normalizer splits it on the source's
    /// documented delimiter.
    pub authors: Option<String>,
    pub external_ids: Vec<String>,
    pub excerpt: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Per-record observation time, when the adapter knows it.
    /// Defaults to the batch fetch time during normalization.
    pub observed_at: Option<DateTime<Utc>>,
}

// --- Mentions ---

/// One observed reference to an item, from one source at one point in time.
/// Immutable once created: superseding information becomes a new mention on
/// the same item, never an edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub source_id: String,
    pub observed_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub title: Option<String>,
    /// Ordered author names; empty when the source gave none.
    pub authors: Vec<String>,
    pub external_ids: Vec<ExternalId>,
    pub excerpt: Option<String>,
}

impl Mention {
    /// Dedup identity: a retried fetch re-delivers the same key, and the
    /// clusterer treats re-ingestion as a no-op.
    pub fn key(&self) -> MentionKey {
        MentionKey {
            source_id: self.source_id.clone(),
            observed_at: self.observed_at,
            title: self.title.as_deref().map(normalize_for_compare),
        }
    }
}

/// `(source_id, observed_at, normalized title)` — the idempotency key for
/// ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MentionKey {
    pub source_id: String,
    pub observed_at: DateTime<Utc>,
    pub title: Option<String>,
}

// --- Items ---

/// The resolved real-world entity (paper/report/trend) a cluster of mentions
/// refers to. Mutated only by attaching mentions or absorbing another item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Assigned at first cluster creation, never reassigned.
    pub item_id: Uuid,
    pub canonical_title: Option<String>,
    pub mentions: Vec<Mention>,
    /// Unique source_ids among mentions. Grown additively — unioned on merge,
    /// never recomputed destructively. This drives corroboration, not
    /// mention count.
    pub distinct_sources: std::collections::BTreeSet<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// Whether the seeding mention lacked a title. Gates excerpt-only
    /// matching so excerpt noise never out-votes a titled match.
    pub seeded_without_title: bool,
}

impl Item {
    /// Create a new item seeded with its first mention.
    pub fn seed(item_id: Uuid, mention: Mention) -> Self {
        let mut sources = std::collections::BTreeSet::new();
        sources.insert(mention.source_id.clone());
        let mut item = Item {
            item_id,
            canonical_title: None,
            first_seen_at: mention.observed_at,
            last_seen_at: mention.observed_at,
            seeded_without_title: mention.title.is_none(),
            distinct_sources: sources,
            mentions: vec![mention],
        };
        item.recompute_canonical_title();
        item
    }

    /// Attach a mention. The caller is responsible for key-level dedup;
    /// this only grows state (sources, seen-range) monotonically.
    pub fn attach(&mut self, mention: Mention) {
        self.distinct_sources.insert(mention.source_id.clone());
        if mention.observed_at < self.first_seen_at {
            self.first_seen_at = mention.observed_at;
        }
        if mention.observed_at > self.last_seen_at {
            self.last_seen_at = mention.observed_at;
        }
        self.mentions.push(mention);
        self.recompute_canonical_title();
    }

    /// Union another item's mentions into this one (merge). Mentions already
    /// present by key are skipped; no mention is ever lost.
    pub fn absorb(&mut self, other: Item) {
        let existing: std::collections::HashSet<MentionKey> =
            self.mentions.iter().map(|m| m.key()).collect();
        for mention in other.mentions {
            if !existing.contains(&mention.key()) {
                self.attach(mention);
            }
        }
        for source in other.distinct_sources {
            self.distinct_sources.insert(source);
        }
        if other.first_seen_at < self.first_seen_at {
            self.first_seen_at = other.first_seen_at;
        }
        if other.last_seen_at > self.last_seen_at {
            self.last_seen_at = other.last_seen_at;
        }
        // Excerpt-only matching stays open only if neither side was anchored
        // by a titled seed.
        self.seeded_without_title = self.seeded_without_title && other.seeded_without_title;
        self.recompute_canonical_title();
    }

    /// Corroboration count: distinct sources, not mentions.
    pub fn corroboration(&self) -> usize {
        self.distinct_sources.len()
    }

    /// All canonical identifier forms across member mentions.
    pub fn canonical_ids(&self) -> Vec<String> {
        self.mentions
            .iter()
            .flat_map(|m| m.external_ids.iter().map(ExternalId::canonical))
            .collect()
    }

    /// Longest non-truncated member title, tie-break earliest observed_at.
    /// Falls back to truncated titles when no member has a complete one.
    fn recompute_canonical_title(&mut self) {
        let titled: Vec<(&str, DateTime<Utc>)> = self
            .mentions
            .iter()
            .filter_map(|m| m.title.as_deref().map(|t| (t, m.observed_at)))
            .collect();
        if titled.is_empty() {
            self.canonical_title = None;
            return;
        }
        let complete: Vec<&(&str, DateTime<Utc>)> = titled
            .iter()
            .filter(|(t, _)| !is_truncated_title(t))
            .collect();
        let pool: Vec<&(&str, DateTime<Utc>)> = if complete.is_empty() {
            titled.iter().collect()
        } else {
            complete
        };
        let best = pool
            .into_iter()
            .min_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.1.cmp(&b.1)));
        self.canonical_title = best.map(|(t, _)| t.to_string());
    }
}

/// A title visibly cut off by the source (ellipsis suffix).
fn is_truncated_title(title: &str) -> bool {
    let t = title.trim_end();
    t.ends_with('…') || t.ends_with("...")
}

/// Audit record of an item merge. Recorded whenever a later mention's
/// identifier retroactively links two previously separate items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeEvent {
    pub surviving_item: Uuid,
    pub absorbed_item: Uuid,
    pub surviving_mentions_before: usize,
    pub absorbed_mentions: usize,
    pub mentions_after: usize,
    pub merged_at: DateTime<Utc>,
}

// --- Cursors ---

/// Per-source resumption state. `position` is an opaque token meaningful
/// only to that source's adapter — never minted from the orchestrator's
/// clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub source_id: String,
    pub position: String,
    pub committed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    fn mention(source: &str, hour: u32, title: Option<&str>) -> Mention {
        Mention {
            source_id: source.to_string(),
            observed_at: at(hour),
            published_at: None,
            title: title.map(|t| t.to_string()),
            authors: Vec::new(),
            external_ids: Vec::new(),
            excerpt: None,
        }
    }

    // --- ExternalId parsing ---

    #[test]
    fn parse_doi_prefix() {
        assert_eq!(
            ExternalId::parse("doi:10.1000/XYZ"),
            Some(ExternalId::Doi("10.1000/XYZ".to_string()))
        );
    }

    #[test]
    fn parse_bare_doi() {
        assert_eq!(
            ExternalId::parse("10.48550/arXiv.1706.03762"),
            Some(ExternalId::Doi("10.48550/arXiv.1706.03762".to_string()))
        );
    }

    #[test]
    fn parse_arxiv_abs_url_as_arxiv_id() {
        assert_eq!(
            ExternalId::parse("https://arxiv.org/abs/1706.03762"),
            Some(ExternalId::Arxiv("1706.03762".to_string()))
        );
    }

    #[test]
    fn parse_url_strips_fragment_and_trailing_slash() {
        let id = ExternalId::parse("https://Example.com/Post/#section").unwrap();
        assert_eq!(id, ExternalId::Url("https://example.com/Post".to_string()));
    }

    #[test]
    fn parse_blank_is_none() {
        assert_eq!(ExternalId::parse("   "), None);
    }

    #[test]
    fn canonical_is_case_insensitive() {
        let a = ExternalId::parse("DOI:10.1/X").unwrap();
        let b = ExternalId::parse("doi:10.1/x").unwrap();
        assert_eq!(a.canonical(), b.canonical());
    }

    // --- MentionKey ---

    #[test]
    fn key_normalizes_title() {
        let a = mention("a", 1, Some("  Attention Is All   You Need "));
        let b = mention("a", 1, Some("attention is all you need"));
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn key_distinguishes_sources() {
        let a = mention("a", 1, Some("Foo"));
        let b = mention("b", 1, Some("Foo"));
        assert_ne!(a.key(), b.key());
    }

    // --- Item invariants ---

    #[test]
    fn seed_sets_seen_range_and_source() {
        let item = Item::seed(Uuid::new_v4(), mention("a", 3, Some("Foo")));
        assert_eq!(item.first_seen_at, at(3));
        assert_eq!(item.last_seen_at, at(3));
        assert_eq!(item.corroboration(), 1);
        assert!(!item.seeded_without_title);
    }

    #[test]
    fn attach_grows_sources_monotonically() {
        let mut item = Item::seed(Uuid::new_v4(), mention("a", 3, Some("Foo")));
        item.attach(mention("b", 1, Some("Foo")));
        item.attach(mention("a", 5, Some("Foo")));
        assert_eq!(item.corroboration(), 2);
        assert_eq!(item.first_seen_at, at(1));
        assert_eq!(item.last_seen_at, at(5));
    }

    #[test]
    fn canonical_title_prefers_longest_non_truncated() {
        let mut item = Item::seed(Uuid::new_v4(), mention("a", 1, Some("Attention Is…")));
        item.attach(mention("b", 2, Some("Attention Is All You Need")));
        assert_eq!(
            item.canonical_title.as_deref(),
            Some("Attention Is All You Need")
        );
    }

    #[test]
    fn canonical_title_tie_breaks_by_earliest_observation() {
        let mut item = Item::seed(Uuid::new_v4(), mention("a", 2, Some("Foo Report")));
        item.attach(mention("b", 1, Some("Bar Digest!")));
        // Same length — the earlier observation wins.
        assert_eq!(item.canonical_title.as_deref(), Some("Bar Digest!"));
    }

    #[test]
    fn absorb_unions_without_losing_mentions() {
        let mut a = Item::seed(Uuid::new_v4(), mention("a", 1, Some("Foo")));
        let mut b = Item::seed(Uuid::new_v4(), mention("b", 2, Some("Foo")));
        b.attach(mention("c", 3, Some("Foo")));
        a.absorb(b);
        assert_eq!(a.mentions.len(), 3);
        assert_eq!(a.corroboration(), 3);
        assert_eq!(a.first_seen_at, at(1));
        assert_eq!(a.last_seen_at, at(3));
    }

    #[test]
    fn absorb_skips_duplicate_keys() {
        let shared = mention("a", 1, Some("Foo"));
        let mut a = Item::seed(Uuid::new_v4(), shared.clone());
        let b = Item::seed(Uuid::new_v4(), shared);
        a.absorb(b);
        assert_eq!(a.mentions.len(), 1);
    }
}
