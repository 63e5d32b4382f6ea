//! Query result caching.
//!
//! Keys include the snapshot version, so publishing a new snapshot never
//! serves stale results; old entries simply age out of the LRU.

use lru::LruCache;
use ontograph_core::{ContextExpansion, SearchResults};
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Default number of entries per cache.
const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(n) => n,
    None => unreachable!(),
};

/// (snapshot version, normalized query, limit)
type SearchKey = (u64, String, usize);

/// (snapshot version, focus id, relation types, depth, with content)
type ExpansionKey = (u64, String, String, u32, bool);

/// Caches for repeated queries.
pub struct QueryCache {
    searches: Mutex<LruCache<SearchKey, SearchResults>>,
    expansions: Mutex<LruCache<ExpansionKey, ContextExpansion>>,
}

impl QueryCache {
    /// Create a new cache with the specified capacity.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            searches: Mutex::new(LruCache::new(capacity)),
            expansions: Mutex::new(LruCache::new(capacity)),
        }
    }

    // ==========================================
    // Search Cache
    // ==========================================

    fn search_key(version: u64, query: &str, limit: usize) -> SearchKey {
        (version, query.trim().to_lowercase(), limit)
    }

    /// Get cached search results.
    pub fn get_search(&self, version: u64, query: &str, limit: usize) -> Option<SearchResults> {
        self.searches
            .lock()
            .ok()?
            .get(&Self::search_key(version, query, limit))
            .cloned()
    }

    /// Store search results in cache.
    pub fn set_search(&self, version: u64, query: &str, limit: usize, results: SearchResults) {
        if let Ok(mut guard) = self.searches.lock() {
            guard.put(Self::search_key(version, query, limit), results);
        }
    }

    // ==========================================
    // Expansion Cache
    // ==========================================

    /// Get a cached context expansion. `relations` is the canonical list of
    /// relation types joined with commas.
    pub fn get_expansion(
        &self,
        version: u64,
        id: &str,
        relations: &str,
        depth: u32,
        include_content: bool,
    ) -> Option<ContextExpansion> {
        self.expansions
            .lock()
            .ok()?
            .get(&(
                version,
                id.to_string(),
                relations.to_string(),
                depth,
                include_content,
            ))
            .cloned()
    }

    /// Store a context expansion in cache.
    pub fn set_expansion(
        &self,
        version: u64,
        id: &str,
        relations: &str,
        depth: u32,
        include_content: bool,
        expansion: ContextExpansion,
    ) {
        if let Ok(mut guard) = self.expansions.lock() {
            guard.put(
                (
                    version,
                    id.to_string(),
                    relations.to_string(),
                    depth,
                    include_content,
                ),
                expansion,
            );
        }
    }

    // ==========================================
    // Maintenance
    // ==========================================

    /// Drop every entry.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.searches.lock() {
            guard.clear();
        }
        if let Ok(mut guard) = self.expansions.lock() {
            guard.clear();
        }
    }

    /// Number of cached entries across all caches.
    pub fn len(&self) -> usize {
        let searches = self.searches.lock().map(|g| g.len()).unwrap_or(0);
        let expansions = self.expansions.lock().map(|g| g.len()).unwrap_or(0);
        searches + expansions
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY.get())
    }
}
