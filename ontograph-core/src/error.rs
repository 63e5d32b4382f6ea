//! Error types for ontograph-core

use thiserror::Error;

/// Errors returned by the graph store, query engine and update coordinator.
///
/// None of these are fatal: every variant is a value handed back to the
/// caller, and batch application records them per item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Identifier or label did not resolve to a concept
    #[error("Concept not found: {0}")]
    NotFound(String),

    /// Traversal depth outside `1..=ceiling`
    #[error("Invalid depth {depth}: must be between 1 and {ceiling}")]
    InvalidDepth { depth: u32, ceiling: u32 },

    /// Result limit rejected by the engine
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    /// Relation with an unknown endpoint or relation type
    #[error("Invalid relation {source_id} -[{relation}]-> {target_id}: {reason}")]
    InvalidRelation {
        source_id: String,
        relation: String,
        target_id: String,
        reason: String,
    },

    /// Record failed basic shape checks
    #[error("Malformed record {id:?}: {reason}")]
    MalformedRecord { id: String, reason: String },
}

impl GraphError {
    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Create an invalid relation error
    pub fn invalid_relation(
        source_id: impl Into<String>,
        relation: impl Into<String>,
        target_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRelation {
            source_id: source_id.into(),
            relation: relation.into(),
            target_id: target_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed record error
    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
