//! Ontograph Core
//!
//! In-memory knowledge graph of concepts linked by typed relations, with
//! the indexes and query primitives needed to retrieve context from it.
//!
//! ## Features
//!
//! - **Versioned snapshots** - Every committed batch publishes a new immutable graph version
//! - **Lock-free reads** - Queries run against an `Arc` snapshot and never wait on writers
//! - **Structural sharing** - A new version copies only the buckets a batch touched
//! - **Weighted search** - Tokens in labels outrank alternate labels, which outrank definitions
//! - **Bounded traversal** - Context expansion and shortest paths over chosen relation types
//!
//! ## Example
//!
//! ```
//! use ontograph_core::{Concept, RelationSpec, RelationType, UpdateCoordinator, UpdateOp};
//!
//! # fn main() -> ontograph_core::Result<()> {
//! let coordinator = UpdateCoordinator::new();
//! let report = coordinator.apply(vec![
//!     UpdateOp::upsert(Concept::new("ml", "Machine Learning"), vec![]),
//!     UpdateOp::upsert(
//!         Concept::new("sl", "Supervised Learning"),
//!         vec![RelationSpec::new(RelationType::Broader, "ml")],
//!     ),
//! ]);
//! assert_eq!(report.version, 1);
//!
//! let engine = coordinator.engine();
//! let results = engine.search("learning", 10)?;
//! assert_eq!(results.hits.len(), 2);
//!
//! let path = engine.shortest_path("sl", "ml")?;
//! assert_eq!(path.map(|p| p.length), Some(1));
//! # Ok(())
//! # }
//! ```

pub mod concept;
pub mod coordinator;
pub mod error;
pub mod index;
pub mod query;
pub mod queue;
pub mod snapshot;
pub mod store;
pub mod text_index;

// Re-exports for convenience
pub use concept::{Concept, Direction, Relation, RelationSpec, RelationType, UnknownRelationType};
pub use coordinator::{UpdateCoordinator, UpdateFailure, UpdateOp, UpdateReport};
pub use error::{GraphError, Result};
pub use index::IndexSet;
pub use query::{
    ConceptPath, ConceptSummary, ContextExpansion, ContextNote, ExpandOptions, GraphStatistics,
    QueryEngine, SearchHit, SearchResults,
};
pub use queue::{QueueClosed, UpdateQueue};
pub use snapshot::GraphSnapshot;
pub use store::GraphStore;
pub use text_index::{MatchField, TokenIndex};
