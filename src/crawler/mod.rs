//! Crawl engine: frontier queue, page fetcher, and the worker-pool scheduler

mod fetcher;
mod frontier;
mod scheduler;

pub use fetcher::CollectionFetcher;
pub use frontier::{CrawlTask, Frontier};
pub use scheduler::Scheduler;

use crate::auth::ChallengeSolver;
use crate::config::Config;
use crate::extract::PageExtractor;
use crate::registry::Entity;
use crate::Result;
use std::sync::Arc;

/// Runs a complete crawl and returns the final result set
///
/// Logs in on a pooled session, seeds the frontier, runs the worker pool to
/// natural completion (frontier drained and all workers idle), and returns
/// the registry snapshot.
pub async fn crawl(
    config: Config,
    extractor: Arc<dyn PageExtractor>,
    solver: Arc<dyn ChallengeSolver>,
) -> Result<Vec<Entity>> {
    let scheduler = Scheduler::new(config, extractor, solver)?;
    scheduler.run().await?;
    Ok(scheduler.registry().snapshot())
}
