use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use signalsift_common::Config;
use signalsift_engine::{Clusterer, IdentityResolver, RankingPolicy, ResolverConfig};
use signalsift_store::{CursorStore, FileCursorStore, FileItemStore};

#[derive(Parser)]
#[command(name = "signalsift", about = "Cross-source corroboration digest engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show per-source cursor positions and ages.
    Status,
    /// Reset ingestion cursors — the next run re-fetches from each source's
    /// initial position.
    Reset {
        /// Reset only this source (default: all sources).
        #[arg(long)]
        source: Option<String>,
    },
    /// Rank the persisted items and print those clearing the corroboration bar.
    Items {
        /// Override the configured minimum distinct-source count.
        #[arg(long)]
        min_sources: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("signalsift=info".parse()?))
        .init();

    let config = Config::from_env();
    let cursors = FileCursorStore::in_dir(&config.data_dir);

    match Cli::parse().command {
        Command::Status => {
            let mut all = cursors.all()?;
            if all.is_empty() {
                println!("Never run before — the next run fetches each source from its initial position");
                return Ok(());
            }
            all.sort_by(|a, b| a.source_id.cmp(&b.source_id));
            for cursor in all {
                let age = Utc::now() - cursor.committed_at;
                println!(
                    "{:<32} position={:<24} committed {}h {}m ago",
                    cursor.source_id,
                    cursor.position,
                    age.num_hours(),
                    age.num_minutes() % 60,
                );
            }
        }
        Command::Reset { source } => match source {
            Some(source_id) => {
                if cursors.reset(&source_id)? {
                    println!("Reset cursor for {source_id}");
                } else {
                    println!("No cursor for {source_id}");
                }
            }
            None => {
                let all = cursors.all()?;
                if all.is_empty() {
                    println!("No cursors to reset");
                }
                for cursor in all {
                    cursors.reset(&cursor.source_id)?;
                    println!("Reset cursor for {}", cursor.source_id);
                }
            }
        },
        Command::Items { min_sources } => {
            let snapshot = FileItemStore::in_dir(&config.data_dir).load();
            let clusterer = Clusterer::from_snapshot(
                snapshot,
                IdentityResolver::new(ResolverConfig::from(&config)),
            );
            let policy = RankingPolicy {
                min_distinct_sources: min_sources.unwrap_or(config.min_corroborating_sources),
            };
            let ranked = policy.rank(clusterer.items());
            if ranked.is_empty() {
                println!(
                    "No items with {}+ corroborating sources",
                    policy.min_distinct_sources
                );
                return Ok(());
            }
            for (i, item) in ranked.iter().enumerate() {
                println!(
                    "[{}] {} — {} source(s), first seen {}",
                    i + 1,
                    item.canonical_title.as_deref().unwrap_or("(untitled)"),
                    item.corroboration(),
                    item.first_seen_at.format("%Y-%m-%d %H:%M"),
                );
                for source in &item.distinct_sources {
                    println!("    · {source}");
                }
            }
        }
    }

    Ok(())
}
