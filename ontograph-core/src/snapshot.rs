//! Versioned graph snapshots.
//!
//! A [`GraphSnapshot`] pairs a [`GraphStore`] with the [`IndexSet`] derived
//! from it. Once wrapped in an `Arc` and published by the
//! [`UpdateCoordinator`](crate::UpdateCoordinator) it is never mutated again;
//! the mutation methods are crate-private and only reachable on a working
//! copy.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::concept::{validate_id, Concept, RelationType};
use crate::error::{GraphError, Result};
use crate::index::IndexSet;
use crate::store::{GraphStore, UpsertOutcome};

/// An immutable (graph, indexes) pair as of a logical version.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    version: u64,
    published_at: DateTime<Utc>,
    store: GraphStore,
    index: IndexSet,
}

impl GraphSnapshot {
    /// The empty graph at version 0.
    pub fn empty() -> Self {
        Self {
            version: 0,
            published_at: Utc::now(),
            store: GraphStore::new(),
            index: IndexSet::new(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn index(&self) -> &IndexSet {
        &self.index
    }

    /// Working copy for the next version. Shares all storage with `self`
    /// until written to.
    pub(crate) fn next_working_copy(&self) -> Self {
        let mut working = self.clone();
        working.version = self.version + 1;
        working
    }

    pub(crate) fn stamp(&mut self) {
        self.published_at = Utc::now();
    }

    /// Upsert a concept into store and indexes together.
    pub(crate) fn upsert(
        &mut self,
        concept: Concept,
        relations: &[(RelationType, String)],
    ) -> Result<UpsertOutcome> {
        concept.validate()?;
        if let Some(notation) = &concept.notation {
            if let Some(holder) = self.index.find_by_notation(notation) {
                if holder != concept.id {
                    return Err(GraphError::malformed(
                        &concept.id,
                        format!("notation {notation} already used by {holder}"),
                    ));
                }
            }
        }

        let id = concept.id.clone();
        let outcome = self.store.upsert(concept, relations)?;
        let stored = Arc::clone(self.store.get(&id)?);
        self.index.insert(&stored, outcome.previous.as_ref());
        Ok(outcome)
    }

    /// Remove a concept from store and indexes. Returns whether it existed.
    pub(crate) fn remove(&mut self, id: &str) -> Result<bool> {
        validate_id(id)?;
        match self.store.remove(id) {
            Some(removed) => {
                self.index.remove(&removed);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) fn add_relation(
        &mut self,
        source: &str,
        relation: RelationType,
        target: &str,
    ) -> Result<bool> {
        self.store.add_relation(source, relation, target)
    }
}

impl Default for GraphSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
