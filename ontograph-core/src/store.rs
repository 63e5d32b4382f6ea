//! Graph store: concepts as nodes, typed relations as directed edges.
//!
//! Adjacency is kept in both directions so removing a concept only touches
//! its own neighbours. Ids are interned as `Arc<str>` and every bucket sits
//! behind an `Arc` that is copied on first write (`Arc::make_mut`). Cloning a
//! store to obtain a working copy therefore only bumps reference counts: ids,
//! concepts and adjacency lists are shared with the source until written.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::concept::{Concept, Direction, Relation, RelationType};
use crate::error::{GraphError, Result};

/// One side of an edge as seen from a node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Adjacent {
    relation: RelationType,
    id: Arc<str>,
}

type AdjacencyList = Arc<BTreeSet<Adjacent>>;

/// What an upsert did beyond storing the concept.
#[derive(Debug, Clone, Default)]
pub struct UpsertOutcome {
    /// The record that was replaced, if the id already existed
    pub previous: Option<Arc<Concept>>,
    /// Number of outgoing edges stored
    pub edges_added: usize,
    /// Relations whose target is not (yet) in the graph
    pub unresolved: Vec<(RelationType, String)>,
    /// Relations rejected outright (self-loops)
    pub rejected: Vec<GraphError>,
}

/// Node and edge tables of one graph version.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: HashMap<Arc<str>, Arc<Concept>>,
    outgoing: HashMap<Arc<str>, AdjacencyList>,
    incoming: HashMap<Arc<str>, AdjacencyList>,
    edge_count: usize,
}

impl GraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a concept together with the edges it owns.
    ///
    /// Replacement is whole-record: every outgoing edge of the previous
    /// version is dropped before the new ones are added. Incoming edges from
    /// other concepts are kept. Targets that do not exist are returned in
    /// [`UpsertOutcome::unresolved`] instead of failing the call.
    pub fn upsert(
        &mut self,
        concept: Concept,
        relations: &[(RelationType, String)],
    ) -> Result<UpsertOutcome> {
        concept.validate()?;
        let id = self.intern(&concept.id);

        self.clear_outgoing(&id);
        let previous = self.nodes.insert(Arc::clone(&id), Arc::new(concept));

        let mut outcome = UpsertOutcome {
            previous,
            ..Default::default()
        };

        for (relation, target) in relations {
            if target.as_str() == &*id {
                outcome.rejected.push(GraphError::invalid_relation(
                    &*id,
                    relation.as_str(),
                    target,
                    "self-loop",
                ));
                continue;
            }
            match self.node_key(target) {
                Some(target_key) => {
                    if self.insert_edge(&id, *relation, target_key) {
                        outcome.edges_added += 1;
                    }
                }
                None => outcome.unresolved.push((*relation, target.clone())),
            }
        }

        Ok(outcome)
    }

    /// Add a single edge between two existing concepts.
    ///
    /// Returns `Ok(false)` if the edge was already present.
    pub fn add_relation(&mut self, source: &str, relation: RelationType, target: &str) -> Result<bool> {
        if source == target {
            return Err(GraphError::invalid_relation(
                source,
                relation.as_str(),
                target,
                "self-loop",
            ));
        }
        let unknown = |endpoint: &str| {
            GraphError::invalid_relation(
                source,
                relation.as_str(),
                target,
                format!("unknown endpoint {endpoint}"),
            )
        };
        let source_key = self.node_key(source).ok_or_else(|| unknown(source))?;
        let target_key = self.node_key(target).ok_or_else(|| unknown(target))?;
        Ok(self.insert_edge(&source_key, relation, target_key))
    }

    /// Remove a concept and every edge incident to it.
    ///
    /// Removing an absent id is a no-op and returns `None`.
    pub fn remove(&mut self, id: &str) -> Option<Arc<Concept>> {
        let (key, removed) = self.nodes.remove_entry(id)?;

        self.clear_outgoing(id);

        if let Some(sources) = self.incoming.remove(id) {
            for adjacent in sources.iter() {
                let edge = Adjacent {
                    relation: adjacent.relation,
                    id: Arc::clone(&key),
                };
                if detach(&mut self.outgoing, &adjacent.id, &edge) {
                    self.edge_count -= 1;
                }
            }
        }

        Some(removed)
    }

    /// Look up a concept by identifier.
    pub fn get(&self, id: &str) -> Result<&Arc<Concept>> {
        self.nodes.get(id).ok_or_else(|| GraphError::not_found(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Neighbour ids of `id`, ascending and without duplicates.
    ///
    /// `relation == None` follows every relation type.
    pub fn neighbors(
        &self,
        id: &str,
        relation: Option<RelationType>,
        direction: Direction,
    ) -> Vec<&str> {
        let tables: &[&HashMap<Arc<str>, AdjacencyList>] = match direction {
            Direction::Outgoing => &[&self.outgoing],
            Direction::Incoming => &[&self.incoming],
            Direction::Both => &[&self.outgoing, &self.incoming],
        };

        let mut ids: Vec<&str> = tables
            .iter()
            .filter_map(|table| table.get(id))
            .flat_map(|list| list.iter())
            .filter(|adjacent| relation.map_or(true, |r| adjacent.relation == r))
            .map(|adjacent| &*adjacent.id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Outgoing edges of `id` in (relation, target) order.
    pub fn outgoing_relations(&self, id: &str) -> Vec<Relation> {
        self.outgoing
            .get(id)
            .map(|list| {
                list.iter()
                    .map(|adjacent| Relation {
                        relation: adjacent.relation,
                        source: id.to_string(),
                        target: adjacent.id.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Iterate over all stored concepts in arbitrary order.
    pub fn concepts(&self) -> impl Iterator<Item = &Arc<Concept>> + '_ {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// The shared key of a stored concept.
    fn node_key(&self, id: &str) -> Option<Arc<str>> {
        self.nodes.get_key_value(id).map(|(key, _)| Arc::clone(key))
    }

    /// Reuse the stored key for `id`, allocating only for new concepts.
    fn intern(&self, id: &str) -> Arc<str> {
        self.node_key(id).unwrap_or_else(|| Arc::from(id))
    }

    fn insert_edge(&mut self, source: &Arc<str>, relation: RelationType, target: Arc<str>) -> bool {
        let forward = Adjacent {
            relation,
            id: Arc::clone(&target),
        };
        let inserted =
            Arc::make_mut(self.outgoing.entry(Arc::clone(source)).or_default()).insert(forward);
        if inserted {
            let backward = Adjacent {
                relation,
                id: Arc::clone(source),
            };
            Arc::make_mut(self.incoming.entry(target).or_default()).insert(backward);
            self.edge_count += 1;
        }
        inserted
    }

    /// Drop every edge whose source is `id`.
    fn clear_outgoing(&mut self, id: &str) {
        let Some((key, targets)) = self.outgoing.remove_entry(id) else {
            return;
        };
        for adjacent in targets.iter() {
            let edge = Adjacent {
                relation: adjacent.relation,
                id: Arc::clone(&key),
            };
            detach(&mut self.incoming, &adjacent.id, &edge);
            self.edge_count -= 1;
        }
    }
}

/// Remove `edge` from the adjacency list of `owner`, dropping the list once
/// it is empty.
fn detach(table: &mut HashMap<Arc<str>, AdjacencyList>, owner: &str, edge: &Adjacent) -> bool {
    let Some(list) = table.get_mut(owner) else {
        return false;
    };
    if !list.contains(edge) {
        return false;
    }
    let list = Arc::make_mut(list);
    list.remove(edge);
    if list.is_empty() {
        table.remove(owner);
    }
    true
}
