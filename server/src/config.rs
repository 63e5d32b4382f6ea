//! Runtime configuration.
//!
//! Every setting can be given on the command line or through an
//! `ONTOGRAPH_*` environment variable.

use clap::Args;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ServerResult;

/// Default debounce interval in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Settings shared by every command.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Directory holding concept record files
    #[arg(long, short, env = "ONTOGRAPH_RECORDS", default_value = ".")]
    pub records: PathBuf,

    /// Glob patterns selecting record files, relative to the records directory
    #[arg(
        long = "pattern",
        env = "ONTOGRAPH_PATTERNS",
        value_delimiter = ',',
        default_value = "**/*.json"
    )]
    pub patterns: Vec<String>,

    /// Quiet period before a burst of file changes is applied
    #[arg(long, env = "ONTOGRAPH_DEBOUNCE_MS", default_value_t = DEFAULT_DEBOUNCE_MS)]
    pub debounce_ms: u64,

    #[command(flatten)]
    pub limits: Limits,

    /// Number of search results kept per snapshot version
    #[arg(long, env = "ONTOGRAPH_CACHE_CAPACITY", default_value_t = 100)]
    pub cache_capacity: usize,
}

/// Caller-side ceilings applied before a request reaches the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Args)]
pub struct Limits {
    /// Longest accepted search query, in characters
    #[arg(long, env = "ONTOGRAPH_MAX_QUERY_LENGTH", default_value_t = 1000)]
    pub max_query_length: usize,

    /// Deepest accepted context expansion
    #[arg(long, env = "ONTOGRAPH_MAX_CONTEXT_DEPTH", default_value_t = 3)]
    pub max_context_depth: u32,

    /// Most results returned by a single query
    #[arg(long, env = "ONTOGRAPH_MAX_RESULTS", default_value_t = 100)]
    pub max_results_per_query: usize,

    /// Concept content beyond this many characters is truncated on load
    #[arg(long, env = "ONTOGRAPH_MAX_CONTENT_LENGTH", default_value_t = 50_000)]
    pub max_content_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_query_length: 1000,
            max_context_depth: 3,
            max_results_per_query: 100,
            max_content_length: 50_000,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            records: PathBuf::from("."),
            patterns: vec!["**/*.json".to_string()],
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            limits: Limits::default(),
            cache_capacity: 100,
        }
    }
}

impl Settings {
    /// Settings for a records directory, defaults elsewhere.
    pub fn for_records(records: impl Into<PathBuf>) -> Self {
        Self {
            records: records.into(),
            ..Self::default()
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Compile the record patterns into one matcher.
    pub fn record_matcher(&self) -> ServerResult<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.patterns {
            builder.add(Glob::new(pattern)?);
        }
        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::Path;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        settings: Settings,
    }

    #[test]
    fn test_defaults_match_cli_defaults() {
        let parsed = TestCli::try_parse_from(["ontograph"]).unwrap().settings;
        let defaults = Settings::default();
        assert_eq!(parsed.patterns, defaults.patterns);
        assert_eq!(parsed.debounce_ms, defaults.debounce_ms);
        assert_eq!(parsed.limits, defaults.limits);
        assert_eq!(parsed.cache_capacity, defaults.cache_capacity);
    }

    #[test]
    fn test_parse_overrides() {
        let parsed = TestCli::try_parse_from([
            "ontograph",
            "--records",
            "/notes",
            "--pattern",
            "*.json,concepts/**/*.jsonl",
            "--max-context-depth",
            "5",
            "--debounce-ms",
            "50",
        ])
        .unwrap()
        .settings;

        assert_eq!(parsed.records, PathBuf::from("/notes"));
        assert_eq!(parsed.patterns.len(), 2);
        assert_eq!(parsed.limits.max_context_depth, 5);
        assert_eq!(parsed.debounce(), Duration::from_millis(50));
    }

    #[test]
    fn test_record_matcher() {
        let settings = Settings::default();
        let matcher = settings.record_matcher().unwrap();
        assert!(matcher.is_match(Path::new("ml/regression.json")));
        assert!(matcher.is_match(Path::new("top.json")));
        assert!(!matcher.is_match(Path::new("ml/regression.md")));
    }

    #[test]
    fn test_invalid_pattern() {
        let settings = Settings {
            patterns: vec!["[".to_string()],
            ..Settings::default()
        };
        assert!(settings.record_matcher().is_err());
    }
}
