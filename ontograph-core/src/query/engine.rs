//! Query Engine
//!
//! Evaluates lookups, search and traversals against a single snapshot. The
//! engine holds no state of its own; a query started against snapshot N
//! completes against snapshot N regardless of later publications.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::primitives::{
    ConceptPath, ConceptSummary, ContextExpansion, ContextNote, ExpandOptions, GraphStatistics,
    SearchHit, SearchResults,
};
use crate::concept::{Concept, Direction};
use crate::error::{GraphError, Result};
use crate::snapshot::GraphSnapshot;

/// Query engine bound to one published snapshot.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    snapshot: Arc<GraphSnapshot>,
}

impl QueryEngine {
    /// Create a query engine over `snapshot`.
    pub fn new(snapshot: Arc<GraphSnapshot>) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &Arc<GraphSnapshot> {
        &self.snapshot
    }

    /// Resolve a concept by identifier, then label, then notation code.
    pub fn get_concept(&self, id_or_label: &str) -> Result<Arc<Concept>> {
        let index = self.snapshot.index();

        if let Some(concept) = index.by_id(id_or_label) {
            return Ok(Arc::clone(concept));
        }

        index
            .find_by_label(id_or_label)
            .or_else(|| index.find_by_notation(id_or_label))
            .and_then(|id| index.by_id(id))
            .cloned()
            .ok_or_else(|| GraphError::not_found(id_or_label))
    }

    /// Ranked token search.
    ///
    /// Scores are the sum of field weights of the matching query tokens;
    /// ties are ordered by ascending identifier. `limit` is applied as given.
    pub fn search(&self, query: &str, limit: usize) -> Result<SearchResults> {
        if limit == 0 {
            return Err(GraphError::InvalidLimit("limit must be positive".into()));
        }

        let index = self.snapshot.index();
        let mut matches = index.tokens().search(query);
        let total_matches = matches.len();
        matches.truncate(limit);

        let hits = matches
            .into_iter()
            .filter_map(|result| {
                index.by_id(&result.id).map(|concept| SearchHit {
                    concept: ConceptSummary::from(concept.as_ref()),
                    score: result.score,
                    match_field: result.match_field,
                })
            })
            .collect();

        Ok(SearchResults {
            query: query.to_string(),
            hits,
            total_matches,
        })
    }

    /// Breadth-first expansion around a focus concept.
    ///
    /// Follows outgoing edges of the requested relation types up to
    /// `max_depth` hops. Each concept is reported once, at the depth and
    /// relation it was first reached by.
    pub fn expand_context(&self, id: &str, options: &ExpandOptions) -> Result<ContextExpansion> {
        if options.max_depth == 0 || options.max_depth > options.depth_ceiling {
            return Err(GraphError::InvalidDepth {
                depth: options.max_depth,
                ceiling: options.depth_ceiling,
            });
        }

        let store = self.snapshot.store();
        let focus = store.get(id)?;
        let relation_types = options.effective_relation_types();

        let mut direct: BTreeMap<_, Vec<ConceptSummary>> =
            relation_types.iter().map(|r| (*r, Vec::new())).collect();
        let mut transitive: BTreeMap<_, Vec<ConceptSummary>> =
            relation_types.iter().map(|r| (*r, Vec::new())).collect();
        let mut context = Vec::new();
        if options.include_content {
            context.push(ContextNote::from(focus.as_ref()));
        }

        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(focus.id.as_str());
        let mut queue: VecDeque<(&str, u32)> = VecDeque::new();
        queue.push_back((focus.id.as_str(), 0));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= options.max_depth {
                continue;
            }

            for relation in &relation_types {
                for neighbor in store.neighbors(current, Some(*relation), Direction::Outgoing) {
                    if !visited.insert(neighbor) {
                        continue;
                    }
                    let concept = store.get(neighbor)?;
                    let summary = ConceptSummary::from(concept.as_ref());

                    let bucket = if depth == 0 {
                        &mut direct
                    } else {
                        &mut transitive
                    };
                    bucket.entry(*relation).or_default().push(summary);

                    if options.include_content {
                        context.push(ContextNote::from(concept.as_ref()));
                    }

                    queue.push_back((neighbor, depth + 1));
                }
            }
        }

        Ok(ContextExpansion {
            focus: ConceptSummary::from(focus.as_ref()),
            direct,
            transitive,
            max_depth: options.max_depth,
            context,
        })
    }

    /// Shortest undirected path between two concepts.
    ///
    /// Edges of every type are followed in both directions. Among paths of
    /// equal length the one with the lexicographically smallest sequence of
    /// ids wins, which in particular prefers the smallest second node.
    /// Returns `Ok(None)` when the concepts are not connected.
    pub fn shortest_path(&self, from: &str, to: &str) -> Result<Option<ConceptPath>> {
        let store = self.snapshot.store();
        let source = store.get(from)?;
        let target = store.get(to)?;

        let mut parents: HashMap<&str, &str> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        visited.insert(source.id.as_str());
        queue.push_back(source.id.as_str());

        let mut found = source.id == target.id;
        while let Some(current) = queue.pop_front() {
            if found {
                break;
            }
            // Neighbours come back sorted, so the first discovery of a node
            // is along its lexicographically smallest shortest path.
            for neighbor in store.neighbors(current, None, Direction::Both) {
                if !visited.insert(neighbor) {
                    continue;
                }
                parents.insert(neighbor, current);
                if neighbor == target.id {
                    found = true;
                    break;
                }
                queue.push_back(neighbor);
            }
        }

        if !found {
            return Ok(None);
        }

        let mut ids = vec![target.id.as_str()];
        let mut cursor = target.id.as_str();
        while let Some(&parent) = parents.get(cursor) {
            ids.push(parent);
            cursor = parent;
        }
        ids.reverse();

        let path = ids
            .iter()
            .map(|id| store.get(id).map(|c| ConceptSummary::from(c.as_ref())))
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(ConceptPath {
            from: source.id.clone(),
            to: target.id.clone(),
            length: path.len() - 1,
            path,
        }))
    }

    /// Aggregate counts, all tracked incrementally.
    pub fn statistics(&self) -> GraphStatistics {
        let store = self.snapshot.store();
        let index = self.snapshot.index();
        let nodes = store.node_count();
        let edges = store.edge_count();
        let density = if nodes > 1 {
            edges as f64 / (nodes as f64 * (nodes as f64 - 1.0))
        } else {
            0.0
        };

        GraphStatistics {
            version: self.snapshot.version(),
            published_at: self.snapshot.published_at(),
            total_concepts: nodes,
            total_relations: edges,
            density,
            labels: index.label_count(),
            notations: index.notation_count(),
            tokens: index.tokens().token_count(),
        }
    }
}
