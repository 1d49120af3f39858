//! Cross-source corroboration engine.
//!
//! Pure, synchronous pipeline: normalize raw source records into mentions,
//! resolve which item each mention refers to, cluster mentions into items,
//! and rank items by how many independent sources corroborate them.
//! No I/O anywhere in this crate.

pub mod clusterer;
pub mod normalizer;
pub mod ranking;
pub mod resolver;

pub use clusterer::{ClusterSnapshot, Clusterer, IngestAction, IngestOutcome};
pub use normalizer::{Normalizer, RejectedRecord};
pub use ranking::RankingPolicy;
pub use resolver::{IdentityResolver, MatchLayer, ResolverConfig};
