//! One ingestion cycle: Idle → Fetching → Clustering → Ranking → Committing.
//!
//! Sources fetch concurrently (independent I/O); all clustering happens on
//! one sequential path afterwards, so item state never needs a lock. A
//! failing source is isolated — its cursor stays put and the other sources
//! proceed. No cursor commits until the clustered state is durably saved.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use signalsift_common::{Config, Item, Mention, SiftError};
use signalsift_engine::{
    Clusterer, IdentityResolver, IngestAction, MatchLayer, Normalizer, RankingPolicy,
    ResolverConfig,
};
use signalsift_store::{CursorStore, FileCursorStore, FileItemStore};

use crate::run_log::{EventKind, RunLog};
use crate::stats::RunStats;
use crate::traits::{SourceAdapter, SourceFetchError};

pub struct RunOrchestrator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    cursor_store: Arc<dyn CursorStore>,
    item_store: FileItemStore,
    resolver_config: ResolverConfig,
    policy: RankingPolicy,
    data_dir: PathBuf,
}

/// What the caller gets back: per-source accounting plus the ranked items.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    /// Items touched this run that cleared the corroboration bar, strongest
    /// first. Formatting is the presentation layer's problem.
    pub ranked: Vec<Item>,
    pub stats: RunStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub source_id: String,
    pub status: SourceStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceStatus {
    Succeeded { mentions: usize, rejected: usize },
    /// Fetch failed; any salvaged records were still clustered but the
    /// cursor was not advanced.
    FetchFailed { reason: String, salvaged: usize },
    /// Clustered fine but the cursor (or the snapshot it depends on) could
    /// not be durably committed; next run re-fetches from the old position.
    CommitFailed { reason: String },
}

impl RunSummary {
    pub fn source(&self, source_id: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|r| r.source_id == source_id)
    }
}

struct FetchResult {
    adapter: Arc<dyn SourceAdapter>,
    fetched_at: DateTime<Utc>,
    outcome: Result<crate::traits::FetchBatch, SourceFetchError>,
}

impl RunOrchestrator {
    /// Build with file-backed stores in the configured data directory.
    pub fn new(config: &Config, adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self {
            cursor_store: Arc::new(FileCursorStore::in_dir(&config.data_dir)),
            item_store: FileItemStore::in_dir(&config.data_dir),
            resolver_config: ResolverConfig::from(config),
            policy: RankingPolicy::from(config),
            data_dir: config.data_dir.clone(),
            adapters,
        }
    }

    /// Drive one full run. Only a cluster invariant violation (a logic
    /// defect) aborts the run; source failures are isolated and reported.
    pub async fn run(&mut self) -> Result<RunSummary, SiftError> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let mut log = RunLog::new(run_id.clone());
        let mut stats = RunStats::default();

        info!(run_id = %run_id, sources = self.adapters.len(), "Sift run starting");

        // --- Fetching: read cursors, then fetch all sources concurrently ---
        let mut fetch_futures = Vec::new();
        for adapter in &self.adapters {
            let position = self
                .cursor_store
                .read(adapter.source_id())?
                .map(|c| c.position);
            log.log(EventKind::CursorRead {
                source_id: adapter.source_id().to_string(),
                position: position.clone(),
            });
            let adapter = Arc::clone(adapter);
            fetch_futures.push(async move {
                let fetched_at = Utc::now();
                let outcome = adapter.fetch_since(position.as_deref()).await;
                FetchResult {
                    adapter,
                    fetched_at,
                    outcome,
                }
            });
        }
        let fetch_results = futures::future::join_all(fetch_futures).await;

        // --- Clustering: single writer, one source at a time ---
        let snapshot = self.item_store.load();
        let mut clusterer = Clusterer::from_snapshot(
            snapshot,
            IdentityResolver::new(self.resolver_config.clone()),
        );
        let mut touched: BTreeSet<Uuid> = BTreeSet::new();
        let mut staged: Vec<(String, String)> = Vec::new();
        let mut reports: Vec<SourceReport> = Vec::new();

        for result in fetch_results {
            let source_id = result.adapter.source_id().to_string();
            let (records, fetch_failure) = match result.outcome {
                Ok(batch) => {
                    stats.sources_fetched += 1;
                    log.log(EventKind::FetchCompleted {
                        source_id: source_id.clone(),
                        records: batch.records.len() as u32,
                        new_position: batch.new_position.clone(),
                    });
                    staged.push((source_id.clone(), batch.new_position));
                    (batch.records, None)
                }
                Err(err) => {
                    stats.sources_failed += 1;
                    warn!(source = %source_id, reason = %err.reason, salvaged = err.partial.len(),
                        "Source fetch failed, cursor left untouched");
                    log.log(EventKind::FetchFailed {
                        source_id: source_id.clone(),
                        reason: err.reason.clone(),
                        salvaged: err.partial.len() as u32,
                    });
                    (err.partial, Some(err.reason))
                }
            };

            stats.records_fetched += records.len() as u32;
            let normalizer = Normalizer::new(&source_id, result.adapter.author_delimiter());
            let mut mentions: Vec<Mention> = Vec::new();
            let mut rejected = 0usize;
            for record in records {
                match normalizer.normalize(record, result.fetched_at) {
                    Ok(mention) => mentions.push(mention),
                    Err(rejection) => {
                        rejected += 1;
                        stats.mentions_rejected += 1;
                        warn!(source = %source_id, reason = %rejection.reason, "Record rejected");
                        log.log(EventKind::MentionRejected {
                            source_id: source_id.clone(),
                            reason: rejection.reason,
                        });
                    }
                }
            }

            // Stable ascending order within the source for deterministic
            // tie-breaks.
            mentions.sort_by(|a, b| a.observed_at.cmp(&b.observed_at));
            let mention_count = mentions.len();

            for mention in mentions {
                let outcome = clusterer.ingest(mention, started_at)?;
                touched.insert(outcome.item_id);
                match &outcome.action {
                    IngestAction::Created => stats.items_created += 1,
                    IngestAction::Attached(_) => stats.mentions_attached += 1,
                    IngestAction::Duplicate => stats.duplicates_skipped += 1,
                }
                if !matches!(outcome.action, IngestAction::Duplicate) {
                    stats.mentions_ingested += 1;
                }
                for absorbed in &outcome.merged_away {
                    stats.items_merged += 1;
                    log.log(EventKind::ItemsMerged {
                        surviving: outcome.item_id.to_string(),
                        absorbed: absorbed.to_string(),
                    });
                }
                log.log(EventKind::MentionClustered {
                    source_id: source_id.clone(),
                    item_id: outcome.item_id.to_string(),
                    action: action_label(&outcome.action).to_string(),
                });
            }

            reports.push(SourceReport {
                source_id,
                status: match fetch_failure {
                    Some(reason) => SourceStatus::FetchFailed {
                        reason,
                        salvaged: mention_count,
                    },
                    None => SourceStatus::Succeeded {
                        mentions: mention_count,
                        rejected,
                    },
                },
            });
        }

        // --- Ranking: once, over everything this run touched ---
        let touched_items: Vec<&Item> = touched
            .iter()
            .filter_map(|id| clusterer.get(*id))
            .collect();
        let ranked: Vec<Item> = self
            .policy
            .rank(touched_items)
            .into_iter()
            .cloned()
            .collect();
        stats.items_surfaced = ranked.len() as u32;
        log.log(EventKind::RankingComplete {
            surfaced: ranked.len() as u32,
            total_items: clusterer.item_count() as u32,
        });

        // --- Committing: snapshot first, cursors only after ---
        match self.item_store.save(&clusterer.snapshot()) {
            Ok(()) => {
                log.log(EventKind::SnapshotSaved {
                    items: clusterer.item_count() as u32,
                });
                for (source_id, position) in staged {
                    match self.cursor_store.commit(&source_id, &position) {
                        Ok(cursor) => {
                            stats.cursors_committed += 1;
                            log.log(EventKind::CursorCommitted {
                                source_id,
                                position: cursor.position,
                            });
                        }
                        Err(err) => {
                            stats.cursor_commit_failures += 1;
                            warn!(source = %source_id, %err, "Cursor commit failed");
                            log.log(EventKind::CursorCommitFailed {
                                source_id: source_id.clone(),
                                reason: err.to_string(),
                            });
                            mark_commit_failed(&mut reports, &source_id, err.to_string());
                        }
                    }
                }
            }
            Err(err) => {
                // Without a durable snapshot, advancing any cursor could
                // permanently skip mentions. Leave them all.
                warn!(%err, "Item snapshot not persisted, no cursors committed");
                for (source_id, _) in staged {
                    stats.cursor_commit_failures += 1;
                    let reason = format!("item snapshot not persisted: {err}");
                    log.log(EventKind::CursorCommitFailed {
                        source_id: source_id.clone(),
                        reason: reason.clone(),
                    });
                    mark_commit_failed(&mut reports, &source_id, reason);
                }
            }
        }

        if let Err(err) = log.save_to_dir(&self.data_dir, &stats) {
            warn!(%err, "Run log not saved");
        }

        let finished_at = Utc::now();
        info!(run_id = %run_id, surfaced = stats.items_surfaced, "Sift run complete");
        Ok(RunSummary {
            run_id,
            started_at,
            finished_at,
            sources: reports,
            ranked,
            stats,
        })
    }
}

fn mark_commit_failed(reports: &mut [SourceReport], source_id: &str, reason: String) {
    if let Some(report) = reports.iter_mut().find(|r| r.source_id == source_id) {
        report.status = SourceStatus::CommitFailed { reason };
    }
}

fn action_label(action: &IngestAction) -> &'static str {
    match action {
        IngestAction::Created => "created",
        IngestAction::Attached(MatchLayer::Identifier) => "attached:identifier",
        IngestAction::Attached(MatchLayer::TitleAuthor { .. }) => "attached:title_author",
        IngestAction::Attached(MatchLayer::TitleExact) => "attached:title_exact",
        IngestAction::Attached(MatchLayer::ExcerptOnly { .. }) => "attached:excerpt",
        IngestAction::Duplicate => "duplicate",
    }
}
