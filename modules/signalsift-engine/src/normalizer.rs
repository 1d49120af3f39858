//! Mention normalization — raw per-source records become canonical mentions.
//!
//! Pure pipeline step: no network, no side effects. Rejection is a value,
//! not a panic; the caller logs and counts it.

use chrono::{DateTime, Utc};

use signalsift_common::{collapse_whitespace, ExternalId, Mention, RawRecord};

/// Turns raw records from one source into canonical mentions.
/// Constructed per source, with that source's documented author delimiter.
pub struct Normalizer {
    source_id: String,
    author_delimiter: String,
}

/// A record that carried no matchable signal (neither title nor excerpt).
/// Skipped and logged, never propagated as a run failure.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    pub source_id: String,
    pub reason: String,
}

impl Normalizer {
    pub fn new(source_id: impl Into<String>, author_delimiter: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            author_delimiter: author_delimiter.into(),
        }
    }

    /// Normalize one raw record. `fetched_at` stamps `observed_at` when the
    /// adapter did not supply a per-record observation time.
    pub fn normalize(
        &self,
        record: RawRecord,
        fetched_at: DateTime<Utc>,
    ) -> Result<Mention, RejectedRecord> {
        let title = record
            .title
            .as_deref()
            .map(collapse_whitespace)
            .filter(|t| !t.is_empty());
        let excerpt = record
            .excerpt
            .as_deref()
            .map(collapse_whitespace)
            .filter(|e| !e.is_empty());

        if title.is_none() && excerpt.is_none() {
            return Err(RejectedRecord {
                source_id: self.source_id.clone(),
                reason: "record has neither title nor excerpt".to_string(),
            });
        }

        let authors = record
            .authors
            .as_deref()
            .map(|raw| self.split_authors(raw))
            .unwrap_or_default();

        let external_ids = record
            .external_ids
            .iter()
            .filter_map(|raw| ExternalId::parse(raw))
            .collect();

        Ok(Mention {
            source_id: self.source_id.clone(),
            observed_at: record.observed_at.unwrap_or(fetched_at),
            published_at: record.published_at,
            title,
            authors,
            external_ids,
            excerpt,
        })
    }

    /// Split an author string on the source's delimiter, preserving order.
    fn split_authors(&self, raw: &str) -> Vec<String> {
        raw.split(self.author_delimiter.as_str())
            .map(collapse_whitespace)
            .filter(|a| !a.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: Option<&str>, excerpt: Option<&str>) -> RawRecord {
        RawRecord {
            title: title.map(String::from),
            excerpt: excerpt.map(String::from),
            ..RawRecord::default()
        }
    }

    #[test]
    fn rejects_record_without_title_or_excerpt() {
        let n = Normalizer::new("newsletter:hf", ";");
        let err = n.normalize(record(None, None), Utc::now()).unwrap_err();
        assert_eq!(err.source_id, "newsletter:hf");
    }

    #[test]
    fn whitespace_only_title_counts_as_absent() {
        let n = Normalizer::new("newsletter:hf", ";");
        assert!(n.normalize(record(Some("   "), None), Utc::now()).is_err());
        let m = n
            .normalize(record(Some("   "), Some("some excerpt")), Utc::now())
            .unwrap();
        assert_eq!(m.title, None);
        assert_eq!(m.excerpt.as_deref(), Some("some excerpt"));
    }

    #[test]
    fn collapses_whitespace_but_keeps_casing() {
        let n = Normalizer::new("blog:x", ";");
        let m = n
            .normalize(record(Some("  Attention   Is All\tYou Need "), None), Utc::now())
            .unwrap();
        assert_eq!(m.title.as_deref(), Some("Attention Is All You Need"));
    }

    #[test]
    fn splits_authors_on_source_delimiter() {
        let n = Normalizer::new("blog:x", ";");
        let mut rec = record(Some("Foo"), None);
        rec.authors = Some("Ada Lovelace ;  Alan Turing;".to_string());
        let m = n.normalize(rec, Utc::now()).unwrap();
        assert_eq!(m.authors, vec!["Ada Lovelace", "Alan Turing"]);
    }

    #[test]
    fn missing_authors_is_empty_list() {
        let n = Normalizer::new("blog:x", ";");
        let m = n.normalize(record(Some("Foo"), None), Utc::now()).unwrap();
        assert!(m.authors.is_empty());
    }

    #[test]
    fn parses_identifiers_and_drops_blanks() {
        let n = Normalizer::new("blog:x", ";");
        let mut rec = record(Some("Foo"), None);
        rec.external_ids = vec!["doi:10.1/x".to_string(), "  ".to_string()];
        let m = n.normalize(rec, Utc::now()).unwrap();
        assert_eq!(m.external_ids, vec![ExternalId::Doi("10.1/x".to_string())]);
    }

    #[test]
    fn observed_at_defaults_to_fetch_time() {
        let n = Normalizer::new("blog:x", ";");
        let fetched = Utc::now();
        let m = n.normalize(record(Some("Foo"), None), fetched).unwrap();
        assert_eq!(m.observed_at, fetched);
    }

    #[test]
    fn per_record_observed_at_wins_over_fetch_time() {
        let n = Normalizer::new("blog:x", ";");
        let fetched = Utc::now();
        let earlier = fetched - chrono::Duration::hours(6);
        let mut rec = record(Some("Foo"), None);
        rec.observed_at = Some(earlier);
        let m = n.normalize(rec, fetched).unwrap();
        assert_eq!(m.observed_at, earlier);
    }
}
