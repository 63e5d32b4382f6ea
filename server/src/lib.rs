//! Ontograph Server Library
//!
//! Loads concept records from a directory of JSON files into an
//! [`ontograph_core`] graph, keeps it current as files change, and exposes
//! the query operations behind caller-side limits.

pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod service;
pub mod watcher;

pub use config::{Limits, Settings};
pub use error::{ServerError, ServerResult};
pub use loader::RecordLoader;
pub use service::OntologyService;
pub use watcher::FileWatcher;
