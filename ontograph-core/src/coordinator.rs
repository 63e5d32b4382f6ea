//! Update coordinator: single writer, many readers.
//!
//! Batches of upsert/remove operations are applied to a working copy of the
//! current snapshot. When the batch is done the working copy is published by
//! swapping the `Arc` behind the current-snapshot pointer. Readers clone that
//! `Arc` once per query and never hold a lock while querying.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize, Serializer};

use crate::concept::{Concept, RelationSpec, RelationType};
use crate::error::GraphError;
use crate::query::QueryEngine;
use crate::snapshot::GraphSnapshot;

/// One change emitted by the extraction side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum UpdateOp {
    /// Create or replace a concept and the relations it owns
    Upsert {
        concept: Concept,
        #[serde(default)]
        relations: Vec<RelationSpec>,
    },
    /// Remove a concept and every edge touching it
    Remove { id: String },
}

impl UpdateOp {
    pub fn upsert(concept: Concept, relations: Vec<RelationSpec>) -> Self {
        Self::Upsert { concept, relations }
    }

    pub fn remove(id: impl Into<String>) -> Self {
        Self::Remove { id: id.into() }
    }

    /// Identifier of the concept this operation targets.
    pub fn id(&self) -> &str {
        match self {
            Self::Upsert { concept, .. } => &concept.id,
            Self::Remove { id } => id,
        }
    }
}

/// A single failed item within a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateFailure {
    /// Position of the operation in the batch
    pub index: usize,
    pub id: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: GraphError,
}

fn serialize_error<S: Serializer>(error: &GraphError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&error.to_string())
}

/// Outcome of applying one batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateReport {
    /// Version of the current snapshot after the batch
    pub version: u64,
    /// Whether the batch produced a new snapshot
    pub published: bool,
    pub upserted: usize,
    pub removed: usize,
    pub relations_added: usize,
    pub failures: Vec<UpdateFailure>,
}

impl UpdateReport {
    fn fail(&mut self, index: usize, id: &str, error: GraphError) {
        warn!("Update #{index} ({id}) failed: {error}");
        self.failures.push(UpdateFailure {
            index,
            id: id.to_string(),
            error,
        });
    }
}

/// A relation held back until the end of the batch because its target is
/// upserted by a later operation.
struct DeferredRelation {
    index: usize,
    relation: RelationType,
    target: String,
}

/// Serializes batch application and publishes snapshots.
pub struct UpdateCoordinator {
    current: RwLock<Arc<GraphSnapshot>>,
    writer: Mutex<()>,
}

impl Default for UpdateCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateCoordinator {
    /// Start from the empty graph.
    pub fn new() -> Self {
        Self::with_snapshot(GraphSnapshot::empty())
    }

    pub fn with_snapshot(snapshot: GraphSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
        }
    }

    /// The snapshot currently published.
    pub fn current(&self) -> Arc<GraphSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Query engine over the snapshot currently published.
    pub fn engine(&self) -> QueryEngine {
        QueryEngine::new(self.current())
    }

    /// Apply a batch and publish the result.
    ///
    /// Operations run in order against one working copy. Invalid items are
    /// reported individually and never roll back the rest of the batch. A
    /// batch that changes nothing publishes nothing.
    pub fn apply(&self, batch: Vec<UpdateOp>) -> UpdateReport {
        let _writer = self.writer.lock();

        let base = self.current();
        let mut working = base.next_working_copy();
        let mut report = UpdateReport::default();
        let mut changed = false;

        // Upserts still ahead in the batch, per id
        let mut pending: HashMap<String, usize> = HashMap::new();
        for op in &batch {
            if let UpdateOp::Upsert { concept, .. } = op {
                *pending.entry(concept.id.clone()).or_default() += 1;
            }
        }
        let mut deferred: HashMap<String, Vec<DeferredRelation>> = HashMap::new();

        for (index, op) in batch.into_iter().enumerate() {
            match op {
                UpdateOp::Upsert { concept, relations } => {
                    let id = concept.id.clone();
                    if let Some(count) = pending.get_mut(&id) {
                        *count = count.saturating_sub(1);
                    }

                    let mut parsed = Vec::with_capacity(relations.len());
                    for spec in &relations {
                        match spec.parse(&id) {
                            Ok(relation) => parsed.push((relation, spec.target.clone())),
                            Err(e) => report.fail(index, &id, e),
                        }
                    }

                    match working.upsert(concept, &parsed) {
                        Ok(outcome) => {
                            // The replaced record's held-back relations go with it
                            deferred.remove(&id);
                            debug!("Upserted {id} ({} relations)", outcome.edges_added);
                            changed = true;
                            report.upserted += 1;
                            report.relations_added += outcome.edges_added;
                            for error in outcome.rejected {
                                report.fail(index, &id, error);
                            }
                            for (relation, target) in outcome.unresolved {
                                if pending.get(&target).copied().unwrap_or(0) > 0 {
                                    deferred.entry(id.clone()).or_default().push(
                                        DeferredRelation {
                                            index,
                                            relation,
                                            target,
                                        },
                                    );
                                } else {
                                    let error = GraphError::invalid_relation(
                                        &id,
                                        relation.as_str(),
                                        &target,
                                        "unknown target",
                                    );
                                    report.fail(index, &id, error);
                                }
                            }
                        }
                        Err(e) => report.fail(index, &id, e),
                    }
                }
                UpdateOp::Remove { id } => {
                    deferred.remove(&id);
                    match working.remove(&id) {
                        Ok(true) => {
                            debug!("Removed {id}");
                            changed = true;
                            report.removed += 1;
                        }
                        Ok(false) => debug!("Remove of absent {id} ignored"),
                        Err(e) => report.fail(index, &id, e),
                    }
                }
            }
        }

        let mut deferred: Vec<(String, DeferredRelation)> = deferred
            .into_iter()
            .flat_map(|(source, items)| items.into_iter().map(move |item| (source.clone(), item)))
            .collect();
        deferred.sort_by_key(|(_, item)| item.index);

        for (source, item) in deferred {
            match working.add_relation(&source, item.relation, &item.target) {
                Ok(added) => {
                    if added {
                        changed = true;
                        report.relations_added += 1;
                    }
                }
                Err(e) => report.fail(item.index, &source, e),
            }
        }

        report.failures.sort_by_key(|failure| failure.index);

        if changed {
            working.stamp();
            let working = Arc::new(working);
            report.version = working.version();
            report.published = true;
            *self.current.write() = Arc::clone(&working);
            info!(
                "Published snapshot v{}: {} concepts, {} relations ({} upserted, {} removed, {} failed)",
                working.version(),
                working.store().node_count(),
                working.store().edge_count(),
                report.upserted,
                report.removed,
                report.failures.len()
            );
        } else {
            report.version = base.version();
        }

        report
    }
}
