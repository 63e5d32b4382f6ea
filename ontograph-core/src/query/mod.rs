//! Concept Query Engine
//!
//! Stateless query primitives evaluated against one [`GraphSnapshot`]:
//!
//! - get_concept: resolve by id, label or notation
//! - search: field-weighted token search
//! - expand_context: bounded breadth-first expansion over chosen relations
//! - shortest_path: undirected path between two concepts
//! - statistics: O(1) counts
//!
//! [`GraphSnapshot`]: crate::GraphSnapshot

mod engine;
mod primitives;

pub use engine::QueryEngine;
pub use primitives::*;
