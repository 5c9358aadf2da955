//! In-memory caching for resolved references.
//!
//! Resolution hits several rate-limited providers, so the resolver can keep
//! positive answers around for a while. Entries are keyed by identifier:
//!
//! ```text
//! doi:<lowercased DOI without resolver prefix>
//! title:<normalized title>
//! ```
//!
//! Misses are never stored; a paper that was not found is retried next time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::clock::{Clock, TokioClock};
use super::ids::normalize_doi;
use super::title::normalize;
use crate::config::CacheConfig;
use crate::models::Paper;

/// Result of a cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CacheResult<T> {
    /// Item was found and is valid
    Hit(T),

    /// Item was not found
    Miss,

    /// Item was found but has expired
    Expired,
}

impl<T> CacheResult<T> {
    /// The cached value on a hit
    pub fn hit(self) -> Option<T> {
        match self {
            CacheResult::Hit(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    paper: Paper,
    inserted_at: Instant,
}

/// Bounded, time-limited cache of resolved papers
#[derive(Debug)]
pub struct ResolutionCache {
    max_entries: usize,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl ResolutionCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self::with_clock(max_entries, ttl, Arc::new(TokioClock))
    }

    pub fn with_clock(max_entries: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_entries: max_entries.max(1),
            ttl,
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Build from configuration; `None` when caching is disabled
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config.enabled.then(|| {
            Self::new(config.max_entries, Duration::from_secs(config.ttl_seconds))
        })
    }

    /// Cache key for a DOI lookup
    pub fn doi_key(doi: &str) -> String {
        format!("doi:{}", normalize_doi(doi).to_lowercase())
    }

    /// Cache key for a title lookup
    pub fn title_key(title: &str) -> String {
        format!("title:{}", normalize(title))
    }

    /// Look up a cached paper, dropping it if it has expired
    pub fn get(&self, key: &str) -> CacheResult<Paper> {
        let now = self.clock.now();
        let mut entries = self.lock();

        let expired = match entries.get(key) {
            None => {
                tracing::debug!("Cache MISS: {}", key);
                return CacheResult::Miss;
            }
            Some(entry) => now.saturating_duration_since(entry.inserted_at) >= self.ttl,
        };

        if expired {
            tracing::debug!("Cache expired: {}", key);
            entries.remove(key);
            return CacheResult::Expired;
        }

        tracing::debug!("Cache HIT: {}", key);
        entries
            .get(key)
            .map(|entry| CacheResult::Hit(entry.paper.clone()))
            .unwrap_or(CacheResult::Miss)
    }

    /// Store a resolved paper, evicting the oldest entry when full
    pub fn insert(&self, key: String, paper: Paper) {
        let now = self.clock.now();
        let mut entries = self.lock();

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                tracing::debug!("Cache evicting: {}", oldest);
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                paper,
                inserted_at: now,
            },
        );
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
