//! Result sink and crawl summary
//!
//! The core hands over the registry snapshot at crawl completion; this
//! module serializes it to a JSON file (one object per entity with its
//! nested collection items) and derives summary statistics.

use crate::registry::{Entity, VisitState};
use crate::Result;
use serde::Serialize;
use std::path::Path;

/// Top-level shape of the result file
#[derive(Serialize)]
struct ResultDocument<'a> {
    users: &'a [Entity],
}

/// Writes the final result set as pretty-printed JSON
pub fn write_results(path: &Path, entities: &[Entity]) -> Result<()> {
    let document = ResultDocument { users: entities };
    let json = serde_json::to_string_pretty(&document)?;
    std::fs::write(path, json)?;
    tracing::info!(
        "wrote {} entities to {}",
        entities.len(),
        path.display()
    );
    Ok(())
}

/// Crawl summary derived from the final result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    /// Total entities discovered
    pub total: usize,

    /// Entities whose collection was fetched
    pub done: usize,

    /// Entities discovered but never claimed (outside the depth budget
    /// they would have needed, or left over from failed tasks)
    pub pending: usize,

    /// Collection items across all entities
    pub items: usize,
}

/// Derives summary statistics from a registry snapshot
pub fn collect_stats(entities: &[Entity]) -> CrawlStats {
    let done = entities
        .iter()
        .filter(|e| e.state == VisitState::Done)
        .count();
    let pending = entities
        .iter()
        .filter(|e| e.state != VisitState::Done)
        .count();
    let items = entities.iter().map(|e| e.collection.len()).sum();

    CrawlStats {
        total: entities.len(),
        done,
        pending,
        items,
    }
}

/// Logs the crawl summary
pub fn log_stats(stats: &CrawlStats) {
    tracing::info!(
        "crawl summary: {} entities ({} done, {} pending), {} collection items",
        stats.total,
        stats.done,
        stats.pending,
        stats.items
    );
}
