//! Shared visited/result registry
//!
//! The registry is the single shared mapping from entity id to crawl result.
//! It provides the at-most-once processing guarantee: `try_claim` is an
//! atomic check-and-set, so of any number of workers racing on the same id
//! exactly one wins the claim. All mutations take the internal lock, making
//! each operation atomic from the caller's view.

use crate::{CrawlError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Processing state of a discovered entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitState {
    /// Entity is known but no worker has claimed it yet
    Discovered,

    /// Exactly one worker is fetching this entity's collection
    Processing,

    /// Collection fetched and neighbor discovery (if any) finished
    Done,
}

impl VisitState {
    /// Returns true if no further processing will happen for this entity
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if a worker currently holds this entity
    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Processing | Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Processing => "processing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for VisitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One item of an entity's collection
///
/// Immutable once appended; order matches discovery order on the source page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionItem {
    #[serde(rename = "item-id")]
    pub item_id: String,
    pub title: String,
    pub note: String,
}

/// A crawled user node and its collected data
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub state: VisitState,
    pub collection: Vec<CollectionItem>,
}

impl Entity {
    fn discovered(id: &str, display_name: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            state: VisitState::Discovered,
            collection: Vec::new(),
        }
    }
}

/// Concurrent entity registry shared by all workers
///
/// Injected as an `Arc<Registry>` handle; there are no process-wide
/// singletons.
#[derive(Debug, Default)]
pub struct Registry {
    entities: Mutex<HashMap<String, Entity>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claims an entity for processing
    ///
    /// Returns `Ok(true)` and transitions Discovered -> Processing if the
    /// entity was unclaimed; `Ok(false)` if it is already Processing or Done
    /// (the idempotent-skip path). An id with no registry entry is a
    /// scheduler/registry desynchronization and fails with `EntityLookup`.
    pub fn try_claim(&self, entity_id: &str) -> Result<bool> {
        let mut entities = self.entities.lock().unwrap();
        let entity = entities
            .get_mut(entity_id)
            .ok_or_else(|| CrawlError::EntityLookup {
                id: entity_id.to_string(),
            })?;

        if entity.state.is_claimed() {
            return Ok(false);
        }

        entity.state = VisitState::Processing;
        Ok(true)
    }

    /// Records a newly discovered neighbor as Discovered
    ///
    /// No-op if the id already exists: neighbor discovery never overwrites
    /// existing state or collection data.
    pub fn record_neighbor(&self, entity_id: &str, display_name: &str) {
        let mut entities = self.entities.lock().unwrap();
        entities
            .entry(entity_id.to_string())
            .or_insert_with(|| Entity::discovered(entity_id, display_name));
    }

    /// Stores a fetched collection and transitions Processing -> Done
    ///
    /// Idempotent: recording against an entity that is already Done is a
    /// no-op, so a collection can never be attached twice.
    pub fn record_collection(&self, entity_id: &str, items: Vec<CollectionItem>) -> Result<()> {
        let mut entities = self.entities.lock().unwrap();
        let entity = entities
            .get_mut(entity_id)
            .ok_or_else(|| CrawlError::EntityLookup {
                id: entity_id.to_string(),
            })?;

        if entity.state == VisitState::Done {
            return Ok(());
        }

        entity.collection = items;
        entity.state = VisitState::Done;
        Ok(())
    }

    /// Returns the current state of an entity, if known
    pub fn state_of(&self, entity_id: &str) -> Option<VisitState> {
        self.entities
            .lock()
            .unwrap()
            .get(entity_id)
            .map(|e| e.state)
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.entities.lock().unwrap().contains_key(entity_id)
    }

    pub fn len(&self) -> usize {
        self.entities.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.lock().unwrap().is_empty()
    }

    /// Snapshot of all entities, sorted by id for deterministic output
    pub fn snapshot(&self) -> Vec<Entity> {
        let entities = self.entities.lock().unwrap();
        let mut all: Vec<Entity> = entities.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}
