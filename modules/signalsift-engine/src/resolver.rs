//! Identity resolution — does this mention refer to an existing item?
//!
//! Matching is layered, first hit wins:
//! 1. Identifier overlap (authoritative — handled via the clusterer's id
//!    index, never overridden by a weaker signal)
//! 2. Title similarity above threshold AND a shared author token
//! 3. Exact normalized title, only when the mention has no author data
//! 4. Excerpt similarity, only titleless mention against titleless-seeded item
//!
//! This module holds the fuzzy layers (2–4) as a pure decision function;
//! thresholds are configuration, not contracts.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use signalsift_common::{normalize_for_compare, Config, Item, Mention};

/// Tunables for fuzzy matching.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Token-set overlap threshold for title and excerpt similarity.
    pub title_similarity_threshold: f64,
    /// Bound the candidate set to items seen within this many days.
    /// None scans everything. Identifier matches are exempt.
    pub recent_window_days: Option<i64>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            title_similarity_threshold: 0.85,
            recent_window_days: None,
        }
    }
}

impl From<&Config> for ResolverConfig {
    fn from(config: &Config) -> Self {
        Self {
            title_similarity_threshold: config.title_similarity_threshold,
            recent_window_days: config.resolver_recent_window_days,
        }
    }
}

/// Which layer matched, with the similarity that cleared the bar.
/// Ordered by authority: identifier beats title+author beats exact title
/// beats excerpt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchLayer {
    Identifier,
    TitleAuthor { similarity: f64 },
    TitleExact,
    ExcerptOnly { similarity: f64 },
}

impl MatchLayer {
    /// Lower ranks first when picking the strongest candidate.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            MatchLayer::Identifier => 0,
            MatchLayer::TitleAuthor { .. } => 1,
            MatchLayer::TitleExact => 2,
            MatchLayer::ExcerptOnly { .. } => 3,
        }
    }

    pub(crate) fn similarity(&self) -> f64 {
        match self {
            MatchLayer::Identifier => 1.0,
            MatchLayer::TitleAuthor { similarity } => *similarity,
            MatchLayer::TitleExact => 1.0,
            MatchLayer::ExcerptOnly { similarity } => *similarity,
        }
    }
}

pub struct IdentityResolver {
    config: ResolverConfig,
}

impl IdentityResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Evaluate the fuzzy layers for one mention against one item.
    /// Returns the strongest layer that matches, or None.
    pub fn match_item(&self, mention: &Mention, item: &Item, now: DateTime<Utc>) -> Option<MatchLayer> {
        if let Some(days) = self.config.recent_window_days {
            if (now - item.last_seen_at).num_days() > days {
                return None;
            }
        }

        match mention.title.as_deref() {
            Some(title) => self.match_by_title(mention, title, item),
            None => self.match_by_excerpt(mention, item),
        }
    }

    fn match_by_title(&self, mention: &Mention, title: &str, item: &Item) -> Option<MatchLayer> {
        let normalized = normalize_for_compare(title);
        let mut best_similarity = 0.0_f64;
        let mut exact = false;
        for member in &item.mentions {
            if let Some(member_title) = member.title.as_deref() {
                let member_normalized = normalize_for_compare(member_title);
                if member_normalized == normalized {
                    exact = true;
                }
                best_similarity =
                    best_similarity.max(token_set_overlap(&normalized, &member_normalized));
            }
        }

        if best_similarity >= self.config.title_similarity_threshold
            && shares_author_token(mention, item)
        {
            return Some(MatchLayer::TitleAuthor {
                similarity: best_similarity,
            });
        }

        // Exact title carries the match only when the mention brought no
        // author data at all.
        if exact && mention.authors.is_empty() {
            return Some(MatchLayer::TitleExact);
        }

        None
    }

    /// Titleless mentions may still match by excerpt, but only against items
    /// whose own seeding mention likewise lacked a title.
    fn match_by_excerpt(&self, mention: &Mention, item: &Item) -> Option<MatchLayer> {
        if !item.seeded_without_title {
            return None;
        }
        let excerpt = normalize_for_compare(mention.excerpt.as_deref()?);
        let best = item
            .mentions
            .iter()
            .filter_map(|m| m.excerpt.as_deref())
            .map(|e| token_set_overlap(&excerpt, &normalize_for_compare(e)))
            .fold(0.0_f64, f64::max);
        if best >= self.config.title_similarity_threshold {
            Some(MatchLayer::ExcerptOnly { similarity: best })
        } else {
            None
        }
    }
}

/// Token-set overlap (Jaccard) over lowercased alphanumeric tokens.
pub fn token_set_overlap(a: &str, b: &str) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    intersection as f64 / union as f64
}

fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// At least one normalized author token in common between the mention and
/// any member mention of the item.
fn shares_author_token(mention: &Mention, item: &Item) -> bool {
    let candidate = author_tokens(&mention.authors);
    if candidate.is_empty() {
        return false;
    }
    item.mentions
        .iter()
        .any(|m| !author_tokens(&m.authors).is_disjoint(&candidate))
}

fn author_tokens(authors: &[String]) -> HashSet<String> {
    authors.iter().flat_map(|a| tokens(a)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalsift_common::ExternalId;
    use uuid::Uuid;

    fn mention(source: &str, title: Option<&str>, authors: &[&str], excerpt: Option<&str>) -> Mention {
        Mention {
            source_id: source.to_string(),
            observed_at: Utc::now(),
            published_at: None,
            title: title.map(String::from),
            authors: authors.iter().map(|a| a.to_string()).collect(),
            external_ids: Vec::new(),
            excerpt: excerpt.map(String::from),
        }
    }

    fn item_of(m: Mention) -> Item {
        Item::seed(Uuid::new_v4(), m)
    }

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(ResolverConfig::default())
    }

    // --- token_set_overlap ---

    #[test]
    fn overlap_identical_is_one() {
        assert_eq!(token_set_overlap("attention is all you need", "Attention Is All You Need"), 1.0);
    }

    #[test]
    fn overlap_disjoint_is_zero() {
        assert_eq!(token_set_overlap("foo bar", "baz qux"), 0.0);
    }

    #[test]
    fn overlap_ignores_punctuation() {
        assert_eq!(token_set_overlap("GPT-5: a report", "gpt 5 a report"), 1.0);
    }

    #[test]
    fn overlap_empty_is_zero() {
        assert_eq!(token_set_overlap("", "foo"), 0.0);
    }

    // --- title + author layer ---

    #[test]
    fn similar_title_with_shared_author_matches() {
        let item = item_of(mention("a", Some("Attention Is All You Need"), &["Ashish Vaswani"], None));
        let m = mention("b", Some("Attention is all you need"), &["A. Vaswani"], None);
        let layer = resolver().match_item(&m, &item, Utc::now()).unwrap();
        assert!(matches!(layer, MatchLayer::TitleAuthor { similarity } if similarity >= 0.85));
    }

    #[test]
    fn similar_title_without_shared_author_does_not_match() {
        let item = item_of(mention("a", Some("Attention Is All You Need"), &["Ashish Vaswani"], None));
        let m = mention("b", Some("Attention is all you need"), &["Grace Hopper"], None);
        assert_eq!(resolver().match_item(&m, &item, Utc::now()), None);
    }

    #[test]
    fn dissimilar_title_does_not_match() {
        let item = item_of(mention("a", Some("Attention Is All You Need"), &["Vaswani"], None));
        let m = mention("b", Some("Scaling Laws for Neural LMs"), &["Vaswani"], None);
        assert_eq!(resolver().match_item(&m, &item, Utc::now()), None);
    }

    // --- exact-title layer ---

    #[test]
    fn exact_title_without_authors_matches() {
        let item = item_of(mention("a", Some("Attention Is All You Need"), &["Vaswani"], None));
        let m = mention("b", Some("attention is   all you need"), &[], None);
        assert_eq!(resolver().match_item(&m, &item, Utc::now()), Some(MatchLayer::TitleExact));
    }

    #[test]
    fn exact_title_with_unshared_authors_does_not_match() {
        // Author data present but contradictory — the exact-title layer is
        // reserved for mentions with no author data at all.
        let item = item_of(mention("a", Some("State of AI Report"), &["Nathan Benaich"], None));
        let m = mention("b", Some("State of AI Report"), &["Someone Else"], None);
        assert_eq!(resolver().match_item(&m, &item, Utc::now()), None);
    }

    // --- excerpt layer ---

    #[test]
    fn titleless_mention_matches_titleless_item_by_excerpt() {
        let item = item_of(mention("a", None, &[], Some("a new benchmark for agentic coding models")));
        let m = mention("b", None, &[], Some("a new benchmark for agentic coding models"));
        let layer = resolver().match_item(&m, &item, Utc::now()).unwrap();
        assert!(matches!(layer, MatchLayer::ExcerptOnly { .. }));
    }

    #[test]
    fn excerpt_never_matches_titled_item() {
        let item = item_of(mention("a", Some("Agentic Coding Benchmark"), &[], Some("a new benchmark for agentic coding models")));
        let m = mention("b", None, &[], Some("a new benchmark for agentic coding models"));
        assert_eq!(resolver().match_item(&m, &item, Utc::now()), None);
    }

    // --- recent window ---

    #[test]
    fn stale_item_outside_window_is_not_a_candidate() {
        let mut old = mention("a", Some("Attention Is All You Need"), &[], None);
        old.observed_at = Utc::now() - chrono::Duration::days(120);
        let item = item_of(old);
        let m = mention("b", Some("Attention Is All You Need"), &[], None);

        let bounded = IdentityResolver::new(ResolverConfig {
            recent_window_days: Some(30),
            ..ResolverConfig::default()
        });
        assert_eq!(bounded.match_item(&m, &item, Utc::now()), None);
        assert!(resolver().match_item(&m, &item, Utc::now()).is_some());
    }

    // --- layer ordering ---

    #[test]
    fn identifier_layer_outranks_all_others() {
        assert!(MatchLayer::Identifier.rank() < MatchLayer::TitleAuthor { similarity: 1.0 }.rank());
        assert!(MatchLayer::TitleAuthor { similarity: 0.9 }.rank() < MatchLayer::TitleExact.rank());
        assert!(MatchLayer::TitleExact.rank() < MatchLayer::ExcerptOnly { similarity: 1.0 }.rank());
    }

    #[test]
    fn external_ids_do_not_affect_fuzzy_layers() {
        // Identifier matching happens in the clusterer's index; the fuzzy
        // resolver must not be confused by their presence.
        let mut seed = mention("a", Some("Totally Different"), &[], None);
        seed.external_ids = vec![ExternalId::Doi("10.1/x".to_string())];
        let item = item_of(seed);
        let mut m = mention("b", Some("Unrelated Thing"), &[], None);
        m.external_ids = vec![ExternalId::Doi("10.1/x".to_string())];
        assert_eq!(resolver().match_item(&m, &item, Utc::now()), None);
    }
}
