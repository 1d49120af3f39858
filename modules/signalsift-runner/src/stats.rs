use serde::Serialize;

/// Aggregate counters for one run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunStats {
    pub sources_fetched: u32,
    pub sources_failed: u32,
    pub records_fetched: u32,
    pub mentions_rejected: u32,
    pub mentions_ingested: u32,
    pub duplicates_skipped: u32,
    pub items_created: u32,
    pub mentions_attached: u32,
    pub items_merged: u32,
    pub items_surfaced: u32,
    pub cursors_committed: u32,
    pub cursor_commit_failures: u32,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Sift Run Complete ===")?;
        writeln!(f, "Sources fetched:    {}", self.sources_fetched)?;
        writeln!(f, "Sources failed:     {}", self.sources_failed)?;
        writeln!(f, "Records fetched:    {}", self.records_fetched)?;
        writeln!(f, "Mentions rejected:  {}", self.mentions_rejected)?;
        writeln!(f, "Mentions ingested:  {}", self.mentions_ingested)?;
        writeln!(f, "Duplicates skipped: {}", self.duplicates_skipped)?;
        writeln!(f, "Items created:      {}", self.items_created)?;
        writeln!(f, "Mentions attached:  {}", self.mentions_attached)?;
        writeln!(f, "Items merged:       {}", self.items_merged)?;
        writeln!(f, "Items surfaced:     {}", self.items_surfaced)?;
        writeln!(f, "Cursors committed:  {}", self.cursors_committed)?;
        if self.cursor_commit_failures > 0 {
            writeln!(f, "Commit failures:    {}", self.cursor_commit_failures)?;
        }
        Ok(())
    }
}
