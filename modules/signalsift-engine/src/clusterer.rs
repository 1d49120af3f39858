//! Corroboration clustering — the authoritative item collection.
//!
//! `ingest` is idempotent on the mention key: a retried fetch re-delivering
//! the same `(source_id, observed_at, title)` is a no-op, not a duplicate
//! count. Identifier matches go through the id index and are authoritative;
//! fuzzy layers scan candidates deterministically. State is serializable so
//! clusters persist across runs.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use signalsift_common::{Item, Mention, MentionKey, MergeEvent, SiftError};

use crate::resolver::{IdentityResolver, MatchLayer};

pub struct Clusterer {
    items: HashMap<Uuid, Item>,
    /// Canonical external id → owning item. Authoritative match layer.
    id_index: HashMap<String, Uuid>,
    /// Mention key → owning item. Ingestion idempotency.
    key_index: HashMap<MentionKey, Uuid>,
    merge_log: Vec<MergeEvent>,
    resolver: IdentityResolver,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestAction {
    /// No existing item matched — a new one was seeded.
    Created,
    /// Attached to an existing item via the given layer.
    Attached(MatchLayer),
    /// Same mention key already ingested — no state change.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub item_id: Uuid,
    pub action: IngestAction,
    /// Item ids absorbed when this mention's identifiers retroactively
    /// linked previously separate items.
    pub merged_away: Vec<Uuid>,
}

/// Serializable cluster state: items plus the merge audit log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub items: Vec<Item>,
    pub merges: Vec<MergeEvent>,
}

impl Clusterer {
    pub fn new(resolver: IdentityResolver) -> Self {
        Self {
            items: HashMap::new(),
            id_index: HashMap::new(),
            key_index: HashMap::new(),
            merge_log: Vec::new(),
            resolver,
        }
    }

    /// Rebuild a clusterer from persisted state, re-deriving both indexes.
    pub fn from_snapshot(snapshot: ClusterSnapshot, resolver: IdentityResolver) -> Self {
        let mut clusterer = Self::new(resolver);
        clusterer.merge_log = snapshot.merges;
        for item in snapshot.items {
            for mention in &item.mentions {
                clusterer.register(item.item_id, mention);
            }
            clusterer.items.insert(item.item_id, item);
        }
        clusterer
    }

    /// Ingest one mention: attach to an existing item or create a new one.
    pub fn ingest(&mut self, mention: Mention, now: DateTime<Utc>) -> Result<IngestOutcome, SiftError> {
        let key = mention.key();
        if let Some(&item_id) = self.key_index.get(&key) {
            debug!(source = %mention.source_id, "Mention already ingested, skipping");
            return Ok(IngestOutcome {
                item_id,
                action: IngestAction::Duplicate,
                merged_away: Vec::new(),
            });
        }

        // Layer 1: identifier overlap via the id index. Authoritative, and
        // the point where retroactive links between items are discovered.
        let mut id_hits: BTreeSet<Uuid> = BTreeSet::new();
        for id in &mention.external_ids {
            if let Some(&item_id) = self.id_index.get(&id.canonical()) {
                id_hits.insert(item_id);
            }
        }
        if !id_hits.is_empty() {
            let (survivor, merged_away) = self.merge_all(id_hits, now)?;
            self.attach(survivor, mention)?;
            return Ok(IngestOutcome {
                item_id: survivor,
                action: IngestAction::Attached(MatchLayer::Identifier),
                merged_away,
            });
        }

        // Layers 2-4: fuzzy scan.
        if let Some((item_id, layer)) = self.best_fuzzy_match(&mention, now) {
            self.attach(item_id, mention)?;
            return Ok(IngestOutcome {
                item_id,
                action: IngestAction::Attached(layer),
                merged_away: Vec::new(),
            });
        }

        // Layer 5: no match — seed a new item.
        let item_id = Uuid::new_v4();
        let item = Item::seed(item_id, mention);
        for m in &item.mentions {
            self.register(item_id, m);
        }
        self.items.insert(item_id, item);
        Ok(IngestOutcome {
            item_id,
            action: IngestAction::Created,
            merged_away: Vec::new(),
        })
    }

    pub fn get(&self, item_id: Uuid) -> Option<&Item> {
        self.items.get(&item_id)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn merge_log(&self) -> &[MergeEvent] {
        &self.merge_log
    }

    /// Deterministically ordered state for persistence.
    pub fn snapshot(&self) -> ClusterSnapshot {
        let mut items: Vec<Item> = self.items.values().cloned().collect();
        items.sort_by(|a, b| {
            a.first_seen_at
                .cmp(&b.first_seen_at)
                .then(a.item_id.cmp(&b.item_id))
        });
        ClusterSnapshot {
            items,
            merges: self.merge_log.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn register(&mut self, item_id: Uuid, mention: &Mention) {
        self.key_index.insert(mention.key(), item_id);
        for id in &mention.external_ids {
            self.id_index.entry(id.canonical()).or_insert(item_id);
        }
    }

    fn attach(&mut self, item_id: Uuid, mention: Mention) -> Result<(), SiftError> {
        self.register(item_id, &mention);
        let item = self.items.get_mut(&item_id).ok_or_else(|| {
            SiftError::ClusterInvariant(format!("attach target {item_id} not in collection"))
        })?;
        item.attach(mention);
        Ok(())
    }

    /// Scan candidates through the fuzzy resolver and pick the strongest
    /// match: layer authority first, then similarity, then earliest
    /// first_seen_at, then item id. The ordering makes the scan independent
    /// of map iteration order.
    fn best_fuzzy_match(&self, mention: &Mention, now: DateTime<Utc>) -> Option<(Uuid, MatchLayer)> {
        let mut best: Option<(Uuid, MatchLayer, DateTime<Utc>)> = None;
        for item in self.items.values() {
            let Some(layer) = self.resolver.match_item(mention, item, now) else {
                continue;
            };
            let candidate = (item.item_id, layer, item.first_seen_at);
            best = match best {
                None => Some(candidate),
                Some(current) => {
                    if stronger_match(&candidate, &current) {
                        Some(candidate)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        best.map(|(id, layer, _)| (id, layer))
    }

    /// Merge every item in `ids` into the one with the earliest
    /// first_seen_at (tie: smaller item id). Returns the survivor and the
    /// absorbed ids; each merge is recorded, never silent.
    fn merge_all(
        &mut self,
        ids: BTreeSet<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<(Uuid, Vec<Uuid>), SiftError> {
        let mut ranked: Vec<(DateTime<Utc>, Uuid)> = ids
            .iter()
            .map(|id| {
                self.items
                    .get(id)
                    .map(|item| (item.first_seen_at, *id))
                    .ok_or_else(|| {
                        SiftError::ClusterInvariant(format!("indexed item {id} not in collection"))
                    })
            })
            .collect::<Result<_, _>>()?;
        ranked.sort();

        let survivor = ranked[0].1;
        let mut merged_away = Vec::new();

        for (_, absorbed_id) in ranked.into_iter().skip(1) {
            let absorbed = self.items.remove(&absorbed_id).ok_or_else(|| {
                SiftError::ClusterInvariant(format!("absorbed item {absorbed_id} disappeared"))
            })?;
            if absorbed.mentions.is_empty() {
                return Err(SiftError::ClusterInvariant(format!(
                    "item {absorbed_id} has zero mentions at merge time"
                )));
            }

            for owner in self.key_index.values_mut() {
                if *owner == absorbed_id {
                    *owner = survivor;
                }
            }
            for owner in self.id_index.values_mut() {
                if *owner == absorbed_id {
                    *owner = survivor;
                }
            }

            let absorbed_mentions = absorbed.mentions.len();
            let surviving_item = self.items.get_mut(&survivor).ok_or_else(|| {
                SiftError::ClusterInvariant(format!("survivor {survivor} not in collection"))
            })?;
            let before = surviving_item.mentions.len();
            surviving_item.absorb(absorbed);
            let after = surviving_item.mentions.len();
            if after == 0 {
                return Err(SiftError::ClusterInvariant(format!(
                    "item {survivor} left with zero mentions after merge"
                )));
            }

            info!(surviving = %survivor, absorbed = %absorbed_id, "Merged items after identifier link");
            self.merge_log.push(MergeEvent {
                surviving_item: survivor,
                absorbed_item: absorbed_id,
                surviving_mentions_before: before,
                absorbed_mentions,
                mentions_after: after,
                merged_at: now,
            });
            merged_away.push(absorbed_id);
        }

        Ok((survivor, merged_away))
    }
}

fn stronger_match(
    a: &(Uuid, MatchLayer, DateTime<Utc>),
    b: &(Uuid, MatchLayer, DateTime<Utc>),
) -> bool {
    if a.1.rank() != b.1.rank() {
        return a.1.rank() < b.1.rank();
    }
    if a.1.similarity() != b.1.similarity() {
        return a.1.similarity() > b.1.similarity();
    }
    if a.2 != b.2 {
        return a.2 < b.2;
    }
    a.0 < b.0
}
