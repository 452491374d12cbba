//! Frontier queue of pending discovery tasks
//!
//! An unbounded multi-producer queue: workers discovering neighbors push
//! without ever blocking, the scheduler drains with a bounded-timeout pop.
//! Ordering across concurrent producers is only approximately FIFO; the
//! guarantee is that every task pushed before a pop attempt eventually
//! becomes visible.

use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

/// One discovery task: an entity id and its distance from the seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub entity_id: String,
    pub depth: u32,
}

/// Concurrent, unbounded FIFO of crawl tasks
#[derive(Debug)]
pub struct Frontier {
    tx: UnboundedSender<CrawlTask>,
    rx: Mutex<UnboundedReceiver<CrawlTask>>,
}

impl Frontier {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Enqueues a task; never blocks
    pub fn push(&self, task: CrawlTask) {
        // The receiver lives as long as self, so the send cannot fail
        let _ = self.tx.send(task);
    }

    /// Dequeues the next task, waiting at most `timeout`
    ///
    /// Returns `None` on an empty-queue timeout; the scheduler uses that
    /// signal together with its in-flight count to decide termination.
    pub async fn pop(&self, timeout: Duration) -> Option<CrawlTask> {
        let mut rx = self.rx.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}
