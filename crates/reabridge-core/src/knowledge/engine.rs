//! Search engine with a bounded, expiring per-query result cache.

use super::document::{KnowledgeBase, Node};
use super::search::{search, SearchResult};
use crate::config::SearchSettings;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct CachedResults {
    stored_at: Instant,
    results: Vec<SearchResult>,
}

/// Knowledge query surface: ranked search plus direct lookup.
///
/// The document is immutable, so cached results only go stale by age.
pub struct SearchEngine {
    kb: Arc<KnowledgeBase>,
    cache: Option<Mutex<LruCache<String, CachedResults>>>,
    ttl: Duration,
}

impl SearchEngine {
    /// Engine without caching.
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self {
            kb,
            cache: None,
            ttl: Duration::ZERO,
        }
    }

    /// Engine caching up to `capacity` distinct queries for `ttl` each.
    /// A capacity of zero disables the cache.
    pub fn with_cache(kb: Arc<KnowledgeBase>, capacity: usize, ttl: Duration) -> Self {
        let cache = NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        Self { kb, cache, ttl }
    }

    pub fn from_settings(kb: Arc<KnowledgeBase>, settings: &SearchSettings) -> Self {
        Self::with_cache(kb, settings.cache_capacity, settings.cache_ttl())
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.kb
    }

    /// Ranked search. Repeated identical queries within the TTL are served
    /// from the cache.
    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        let Some(cache) = &self.cache else {
            return search(&self.kb, query);
        };

        if let Ok(mut cache) = cache.lock() {
            if let Some(entry) = cache.get(query) {
                if entry.stored_at.elapsed() < self.ttl {
                    log::trace!("[SEARCH] cache hit for {:?}", query);
                    return entry.results.clone();
                }
            }
        }

        let results = search(&self.kb, query);
        if let Ok(mut cache) = cache.lock() {
            cache.put(
                query.to_string(),
                CachedResults {
                    stored_at: Instant::now(),
                    results: results.clone(),
                },
            );
        }
        results
    }

    /// Direct section retrieval by path.
    pub fn lookup(&self, path: &str) -> Option<&Node> {
        self.kb.lookup(path)
    }

    /// Number of queries currently cached.
    pub fn cached_queries(&self) -> usize {
        self.cache
            .as_ref()
            .and_then(|c| c.lock().ok().map(|c| c.len()))
            .unwrap_or(0)
    }
}
