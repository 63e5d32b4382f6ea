//! Error types for the Ontograph server.

use ontograph_core::{GraphError, QueueClosed};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid record file {path}: {source}")]
    Record {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid record pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error("Watcher error: {0}")]
    Watcher(#[from] notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Update queue closed")]
    QueueClosed(#[from] QueueClosed),
}

impl ServerError {
    /// Whether the caller can fix this by changing its request.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidInput(_)
                | ServerError::Graph(
                    GraphError::NotFound(_)
                        | GraphError::InvalidDepth { .. }
                        | GraphError::InvalidLimit(_)
                )
        )
    }
}

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display_graph_error() {
        let err = ServerError::from(GraphError::not_found("entropy"));
        assert_eq!(err.to_string(), "Concept not found: entropy");
    }

    #[test]
    fn test_server_error_display_invalid_input() {
        let err = ServerError::InvalidInput("query too long".to_string());
        assert_eq!(err.to_string(), "Invalid input: query too long");
    }

    #[test]
    fn test_server_error_display_record() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ServerError::Record {
            path: PathBuf::from("/notes/a.json"),
            source,
        };
        assert!(err.to_string().starts_with("Invalid record file /notes/a.json"));
    }

    #[test]
    fn test_server_error_display_queue_closed() {
        let err = ServerError::from(QueueClosed);
        assert_eq!(err.to_string(), "Update queue closed");
    }

    #[test]
    fn test_server_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ServerError = io.into();
        assert!(matches!(err, ServerError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_caller_errors() {
        assert!(ServerError::InvalidInput("x".into()).is_caller_error());
        assert!(ServerError::from(GraphError::InvalidDepth {
            depth: 9,
            ceiling: 3
        })
        .is_caller_error());
        assert!(ServerError::from(GraphError::not_found("x")).is_caller_error());
        assert!(!ServerError::from(QueueClosed).is_caller_error());
        assert!(!ServerError::from(GraphError::malformed("x", "bad")).is_caller_error());
    }
}
