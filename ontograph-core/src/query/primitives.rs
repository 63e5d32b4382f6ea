//! Query result types and options
//!
//! Everything returned by the [`QueryEngine`](super::QueryEngine) is plain
//! data that serializes to JSON, so a transport layer can hand it to callers
//! unchanged.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::concept::{Concept, RelationType};
use crate::text_index::MatchField;

/// Default traversal depth for context expansion.
pub const DEFAULT_MAX_DEPTH: u32 = 2;

/// Default ceiling a caller places on traversal depth.
pub const DEFAULT_DEPTH_CEILING: u32 = 3;

/// Short view of a concept used inside query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptSummary {
    pub id: String,
    pub pref_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl From<&Concept> for ConceptSummary {
    fn from(concept: &Concept) -> Self {
        Self {
            id: concept.id.clone(),
            pref_label: concept.pref_label.clone(),
            definition: concept.definition.clone(),
            source: concept.source.clone(),
        }
    }
}

/// A single ranked search match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub concept: ConceptSummary,
    /// Sum of field weights over matching query tokens
    pub score: u32,
    /// Strongest field a query token matched in
    pub match_field: MatchField,
}

/// Ranked search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub hits: Vec<SearchHit>,
    /// Number of matches before truncation to the limit
    pub total_matches: usize,
}

/// Options for context expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandOptions {
    /// Relation types to follow; empty means broader, narrower and related
    pub relation_types: Vec<RelationType>,
    /// Maximum number of hops from the focus concept
    pub max_depth: u32,
    /// Largest `max_depth` the caller accepts
    pub depth_ceiling: u32,
    /// Attach content and source of every reached concept
    pub include_content: bool,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpandOptions {
    pub fn new() -> Self {
        Self {
            relation_types: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            depth_ceiling: DEFAULT_DEPTH_CEILING,
            include_content: false,
        }
    }

    pub fn with_relation_types(mut self, types: Vec<RelationType>) -> Self {
        self.relation_types = types;
        self
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_depth_ceiling(mut self, ceiling: u32) -> Self {
        self.depth_ceiling = ceiling;
        self
    }

    pub fn include_content(mut self) -> Self {
        self.include_content = true;
        self
    }

    /// Requested relation types in order, duplicates removed, with the
    /// default set substituted for an empty request.
    pub fn effective_relation_types(&self) -> Vec<RelationType> {
        if self.relation_types.is_empty() {
            return RelationType::DEFAULT_EXPANSION.to_vec();
        }
        let mut types = Vec::with_capacity(self.relation_types.len());
        for relation in &self.relation_types {
            if !types.contains(relation) {
                types.push(*relation);
            }
        }
        types
    }
}

/// Content attached to an expansion when requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextNote {
    pub id: String,
    pub pref_label: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl From<&Concept> for ContextNote {
    fn from(concept: &Concept) -> Self {
        Self {
            id: concept.id.clone(),
            pref_label: concept.pref_label.clone(),
            content: concept.content.clone(),
            source: concept.source.clone(),
        }
    }
}

/// Result of a bounded context expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextExpansion {
    pub focus: ConceptSummary,
    /// Concepts one hop away, keyed by the relation that reached them
    pub direct: BTreeMap<RelationType, Vec<ConceptSummary>>,
    /// Concepts two or more hops away, keyed by the relation of the last hop
    pub transitive: BTreeMap<RelationType, Vec<ConceptSummary>>,
    pub max_depth: u32,
    /// Focus concept first, then reached concepts in discovery order
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub context: Vec<ContextNote>,
}

impl ContextExpansion {
    /// Ids of every reached concept, direct first.
    pub fn reached_ids(&self) -> Vec<&str> {
        self.direct
            .values()
            .chain(self.transitive.values())
            .flatten()
            .map(|summary| summary.id.as_str())
            .collect()
    }
}

/// Shortest connection between two concepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptPath {
    pub from: String,
    pub to: String,
    /// Number of hops
    pub length: usize,
    /// Concepts from source to target inclusive
    pub path: Vec<ConceptSummary>,
}

impl ConceptPath {
    pub fn ids(&self) -> Vec<&str> {
        self.path.iter().map(|summary| summary.id.as_str()).collect()
    }
}

/// Aggregate counts of one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub version: u64,
    pub published_at: DateTime<Utc>,
    pub total_concepts: usize,
    pub total_relations: usize,
    pub density: f64,
    pub labels: usize,
    pub notations: usize,
    pub tokens: usize,
}
