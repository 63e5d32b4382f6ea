//! Ontology service facade.
//!
//! Wraps the update coordinator and query engine for callers outside the
//! process boundary: applies the configured ceilings, caches repeated
//! queries, and maps failures into [`ServerError`].

use ontograph_core::{
    Concept, ConceptPath, ContextExpansion, ExpandOptions, GraphStatistics, QueryEngine,
    RelationType, SearchResults, UpdateCoordinator, UpdateOp, UpdateReport,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cache::QueryCache;
use crate::config::{Limits, Settings};
use crate::error::{ServerError, ServerResult};
use crate::loader::RecordLoader;

/// Search limit used when the caller gives none.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Query and update entry point shared by the CLI and the watcher.
pub struct OntologyService {
    coordinator: Arc<UpdateCoordinator>,
    cache: QueryCache,
    /// Newest snapshot version the cache has served
    cache_version: AtomicU64,
    limits: Limits,
}

impl OntologyService {
    pub fn new(coordinator: Arc<UpdateCoordinator>, settings: &Settings) -> Self {
        Self {
            coordinator,
            cache: QueryCache::new(settings.cache_capacity),
            cache_version: AtomicU64::new(0),
            limits: settings.limits,
        }
    }

    /// Load every record file under the configured directory into a fresh
    /// graph. The loader is returned so a watcher can keep tracking files.
    pub async fn from_records(settings: &Settings) -> ServerResult<(Self, Arc<RecordLoader>)> {
        let loader = Arc::new(RecordLoader::new(settings)?);
        let coordinator = Arc::new(UpdateCoordinator::new());

        let ops = loader.scan().await?;
        let report = coordinator.apply(ops);
        if !report.failures.is_empty() {
            tracing::warn!("{} records or relations rejected on load", report.failures.len());
        }

        Ok((Self::new(coordinator, settings), loader))
    }

    pub fn coordinator(&self) -> &Arc<UpdateCoordinator> {
        &self.coordinator
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Engine over the snapshot current at the time of the call.
    ///
    /// The first query to see a newer version drops the cached results of
    /// the versions it supersedes.
    fn engine(&self) -> QueryEngine {
        let engine = self.coordinator.engine();
        let version = engine.snapshot().version();
        let superseded = self.cache_version.fetch_max(version, Ordering::AcqRel) < version;
        if superseded && !self.cache.is_empty() {
            tracing::debug!(
                "Dropping {} cached results older than v{}",
                self.cache.len(),
                version
            );
            self.cache.clear();
        }
        engine
    }

    #[cfg(test)]
    fn cached_results(&self) -> usize {
        self.cache.len()
    }

    /// Apply a batch directly, bypassing any queue.
    pub fn apply(&self, ops: Vec<UpdateOp>) -> UpdateReport {
        self.coordinator.apply(ops)
    }

    /// Resolve a concept by id, label or notation.
    pub fn get_concept(&self, id_or_label: &str) -> ServerResult<Arc<Concept>> {
        let id_or_label = id_or_label.trim();
        if id_or_label.is_empty() {
            return Err(ServerError::InvalidInput(
                "concept identifier is empty".to_string(),
            ));
        }
        Ok(self.engine().get_concept(id_or_label)?)
    }

    /// Ranked search. Limits above the configured maximum are clamped.
    pub fn search(&self, query: &str, limit: Option<usize>) -> ServerResult<SearchResults> {
        let query = self.check_query(query)?;
        let limit = self.clamp_limit(limit.unwrap_or(DEFAULT_SEARCH_LIMIT));

        let engine = self.engine();
        let version = engine.snapshot().version();
        if let Some(cached) = self.cache.get_search(version, query, limit) {
            tracing::debug!("Search cache hit: {:?} (v{})", query, version);
            return Ok(cached);
        }

        let results = engine.search(query, limit)?;
        self.cache.set_search(version, query, limit, results.clone());
        Ok(results)
    }

    /// Bounded context expansion around `id`.
    pub fn expand_context(
        &self,
        id: &str,
        relation_types: Vec<RelationType>,
        max_depth: Option<u32>,
        include_content: bool,
    ) -> ServerResult<ContextExpansion> {
        let mut options = ExpandOptions::new()
            .with_relation_types(relation_types)
            .with_depth_ceiling(self.limits.max_context_depth);
        if let Some(depth) = max_depth {
            options = options.with_max_depth(depth);
        }
        if include_content {
            options = options.include_content();
        }

        let engine = self.engine();
        let version = engine.snapshot().version();
        let relations = options
            .effective_relation_types()
            .iter()
            .map(RelationType::as_str)
            .collect::<Vec<_>>()
            .join(",");

        if let Some(cached) =
            self.cache
                .get_expansion(version, id, &relations, options.max_depth, include_content)
        {
            return Ok(cached);
        }

        let expansion = engine.expand_context(id, &options)?;
        self.cache.set_expansion(
            version,
            id,
            &relations,
            options.max_depth,
            include_content,
            expansion.clone(),
        );
        Ok(expansion)
    }

    /// Shortest undirected path, `None` when not connected.
    pub fn shortest_path(&self, from: &str, to: &str) -> ServerResult<Option<ConceptPath>> {
        Ok(self.engine().shortest_path(from, to)?)
    }

    pub fn statistics(&self) -> GraphStatistics {
        self.engine().statistics()
    }

    fn check_query<'a>(&self, query: &'a str) -> ServerResult<&'a str> {
        if query.chars().count() > self.limits.max_query_length {
            return Err(ServerError::InvalidInput(format!(
                "query too long (max {} characters)",
                self.limits.max_query_length
            )));
        }
        let query = query.trim();
        if query.is_empty() {
            return Err(ServerError::InvalidInput("query is empty".to_string()));
        }
        Ok(query)
    }

    fn clamp_limit(&self, limit: usize) -> usize {
        let max = self.limits.max_results_per_query;
        if limit > max {
            tracing::warn!("Limit {} exceeds maximum, capping to {}", limit, max);
            max
        } else {
            limit
        }
    }
}
