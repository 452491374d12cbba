//! Crawl scheduler and worker pool
//!
//! The scheduler drains the frontier into a bounded set of worker tasks.
//! Per-task flow: claim the entity in the registry, fetch its collection on
//! a pooled session, expand neighbors while depth budget remains, mark the
//! entity Done. Per-task errors are contained at the worker boundary; the
//! crawl only stops when the frontier times out empty and every dispatched
//! task has completed.

use crate::auth::{Authenticator, ChallengeSolver};
use crate::config::{Config, CrawlerConfig};
use crate::crawler::fetcher::CollectionFetcher;
use crate::crawler::frontier::{CrawlTask, Frontier};
use crate::extract::PageExtractor;
use crate::registry::Registry;
use crate::session::SessionPool;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// How long one frontier poll waits before re-checking for idle workers
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Orchestrates the whole crawl
pub struct Scheduler {
    crawler: CrawlerConfig,
    registry: Arc<Registry>,
    frontier: Arc<Frontier>,
    pool: Arc<SessionPool>,
    fetcher: Arc<CollectionFetcher>,
    authenticator: Arc<Authenticator>,
}

/// How one worker task ended; failures are logged, not returned
enum TaskOutcome {
    /// Collection recorded; counts for logging
    Done { items: usize, discovered: usize },
    /// Entity was already Processing or Done (idempotent skip)
    Skipped,
}

impl Scheduler {
    /// Builds the shared crawl state from a validated configuration
    ///
    /// The session pool capacity equals the worker count, so acquiring a
    /// session can never deadlock the pool.
    pub fn new(
        config: Config,
        extractor: Arc<dyn PageExtractor>,
        solver: Arc<dyn ChallengeSolver>,
    ) -> Result<Self> {
        let pool = Arc::new(SessionPool::new(
            config.crawler.max_workers as usize,
            &config.site.user_agent,
            &config.site.login_url,
        )?);

        let authenticator = Arc::new(Authenticator::new(
            &config.site.login_url,
            config.credentials.clone(),
            Arc::clone(&extractor),
            solver,
        ));

        let fetcher = Arc::new(CollectionFetcher::new(
            config.site.clone(),
            &config.crawler,
            extractor,
            Arc::clone(&authenticator),
        ));

        Ok(Self {
            crawler: config.crawler,
            registry: Arc::new(Registry::new()),
            frontier: Arc::new(Frontier::new()),
            pool,
            fetcher,
            authenticator,
        })
    }

    /// Shared handle to the result registry
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Runs the crawl to natural completion
    ///
    /// Bootstrap failures (login or challenge rejected before the first
    /// session is authenticated) are fatal; after that, individual task
    /// failures are logged and the crawl continues.
    pub async fn run(&self) -> Result<()> {
        self.bootstrap().await?;

        let max_workers = self.crawler.max_workers as usize;
        let mut workers: JoinSet<()> = JoinSet::new();
        let mut dispatched = 0u64;
        let start = std::time::Instant::now();

        loop {
            match self.frontier.pop(POLL_TIMEOUT).await {
                Some(task) => {
                    // Bounded concurrency: wait for a free worker slot
                    // before dispatching; excess tasks stay in the frontier
                    while workers.len() >= max_workers {
                        if let Some(Err(e)) = workers.join_next().await {
                            tracing::error!("worker task failed to join: {}", e);
                        }
                    }

                    dispatched += 1;
                    workers.spawn(process_task(
                        task,
                        self.crawler.max_depth,
                        Arc::clone(&self.registry),
                        Arc::clone(&self.pool),
                        Arc::clone(&self.fetcher),
                        Arc::clone(&self.frontier),
                    ));
                }
                None => {
                    // Reap finished workers; terminate only once the queue
                    // timed out empty AND nothing is in flight, since an
                    // in-flight worker may still push new tasks
                    while let Some(result) = workers.try_join_next() {
                        if let Err(e) = result {
                            tracing::error!("worker task failed to join: {}", e);
                        }
                    }

                    if workers.is_empty() {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            "crawl complete: {} tasks dispatched, {} entities known, {:?} elapsed",
            dispatched,
            self.registry.len(),
            start.elapsed()
        );

        Ok(())
    }

    /// Logs in on one pooled session and seeds the crawl
    ///
    /// Only this session is authenticated eagerly; the rest of the pool
    /// authenticates lazily through the login-bounce path on first use.
    async fn bootstrap(&self) -> Result<()> {
        let mut session = self.pool.acquire().await?;
        self.authenticator.login(&mut session, None, None).await?;

        let seed = self.crawler.seed_id.clone();
        self.registry.record_neighbor(&seed, &seed);
        self.frontier.push(CrawlTask {
            entity_id: seed.clone(),
            depth: 0,
        });

        tracing::info!("logged in, crawl seeded at entity {}", seed);
        Ok(())
    }
}

/// Worker boundary: runs one task and contains its errors
async fn process_task(
    task: CrawlTask,
    max_depth: u32,
    registry: Arc<Registry>,
    pool: Arc<SessionPool>,
    fetcher: Arc<CollectionFetcher>,
    frontier: Arc<Frontier>,
) {
    match run_task(&task, max_depth, &registry, &pool, &fetcher, &frontier).await {
        Ok(TaskOutcome::Done { items, discovered }) => {
            tracing::info!(
                "entity {} done at depth {}: {} items, {} neighbors",
                task.entity_id,
                task.depth,
                items,
                discovered
            );
        }
        Ok(TaskOutcome::Skipped) => {
            tracing::debug!("entity {} already handled, skipping", task.entity_id);
        }
        Err(e) => {
            // Task dropped, crawl continues; the session guard has already
            // returned the session to the pool
            tracing::error!(
                "task failed for entity {} at depth {}: {}",
                task.entity_id,
                task.depth,
                e
            );
        }
    }
}

async fn run_task(
    task: &CrawlTask,
    max_depth: u32,
    registry: &Arc<Registry>,
    pool: &Arc<SessionPool>,
    fetcher: &Arc<CollectionFetcher>,
    frontier: &Arc<Frontier>,
) -> Result<TaskOutcome> {
    if !registry.try_claim(&task.entity_id)? {
        return Ok(TaskOutcome::Skipped);
    }

    let mut session = pool.acquire().await?;

    let items = fetcher
        .fetch_collection(&task.entity_id, &mut session)
        .await?;
    let item_count = items.len();

    // Neighbors are pushed before the entity is marked Done, so the
    // termination check can never race ahead of discovery
    let mut discovered = 0;
    if task.depth < max_depth {
        let neighbors = fetcher
            .fetch_neighbors(&task.entity_id, &mut session)
            .await?;
        discovered = neighbors.len();

        for neighbor in neighbors {
            registry.record_neighbor(&neighbor.id, &neighbor.display_name);
            frontier.push(CrawlTask {
                entity_id: neighbor.id,
                depth: task.depth + 1,
            });
        }
    }

    registry.record_collection(&task.entity_id, items)?;

    Ok(TaskOutcome::Done {
        items: item_count,
        discovered,
    })
}
