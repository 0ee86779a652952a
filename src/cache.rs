//! Registry lookup caches
//!
//! Two in-memory caches, owned by the run and handed to the clients:
//! primary enrichment keyed by normalized product name, secondary products
//! keyed by (search term, include-revoked). Concurrent lookups of the same
//! key share one in-flight fetch.
//!
//! `CacheFile` persists both between CLI invocations (`--use-cache`).

use crate::error::Result;
use dashmap::DashMap;
use drugmatch_common::{Confidence, EnrichmentRecord, RegistryProduct};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::future::Future;
use std::hash::Hash;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

const CACHE_FILE_NAME: &str = ".drugmatch-cache.json";

/// Single-flight memo table
pub struct LookupCache<K, V> {
    entries: DashMap<K, Arc<OnceCell<V>>>,
}

impl<K, V> Default for LookupCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<K, V> LookupCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).and_then(|cell| cell.get().cloned())
    }

    pub fn insert(&self, key: K, value: V) {
        let cell = OnceCell::new_with(Some(value));
        self.entries.insert(key, Arc::new(cell));
    }

    /// Cached value, or the result of `fetch`.
    ///
    /// An Err is returned to the caller and not stored.
    pub async fn get_or_try_fetch<E, F, Fut>(&self, key: K, fetch: F) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        let cell = self
            .entries
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_try_init(fetch).await.cloned()
    }

    /// Number of completed entries
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Completed entries
    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.entries
            .iter()
            .filter_map(|entry| {
                entry
                    .value()
                    .get()
                    .map(|value| (entry.key().clone(), value.clone()))
            })
            .collect()
    }
}

/// Secondary registry cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductKey {
    pub term: String,
    pub include_revoked: bool,
}

impl ProductKey {
    pub fn new(term: &str, include_revoked: bool) -> Self {
        Self {
            term: term.trim().to_string(),
            include_revoked,
        }
    }
}

pub type EnrichmentCache = LookupCache<String, EnrichmentRecord>;
pub type ProductCache = LookupCache<ProductKey, Vec<RegistryProduct>>;

/// Both caches of one pipeline
#[derive(Default)]
pub struct RegistryCache {
    pub enrichment: Arc<EnrichmentCache>,
    pub products: Arc<ProductCache>,
}

impl RegistryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.enrichment.clear();
        self.products.clear();
    }
}

/// Persisted cache layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    version: u32,
    /// Normalized product name → enrichment
    enrichment: HashMap<String, EnrichmentRecord>,
    products: Vec<ProductCacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCacheEntry {
    pub term: String,
    pub include_revoked: bool,
    pub products: Vec<RegistryProduct>,
}

impl CacheFile {
    const CURRENT_VERSION: u32 = 1;

    pub fn cache_path(folder: &Path) -> PathBuf {
        folder.join(CACHE_FILE_NAME)
    }

    /// Load the cache file; a missing, unreadable or outdated file is an empty cache.
    pub fn load(folder: &Path) -> Self {
        let cache_path = Self::cache_path(folder);
        if !cache_path.exists() {
            return Self::default();
        }

        let file = match File::open(&cache_path) {
            Ok(f) => f,
            Err(_) => return Self::default(),
        };

        match serde_json::from_reader::<_, CacheFile>(BufReader::new(file)) {
            Ok(cache) if cache.version == Self::CURRENT_VERSION => cache,
            Ok(cache) => {
                warn!(version = cache.version, "cache version mismatch, starting fresh");
                Self::default()
            }
            Err(err) => {
                warn!(error = %err, "unreadable cache file, starting fresh");
                Self::default()
            }
        }
    }

    pub fn save(&self, folder: &Path) -> Result<()> {
        let file = File::create(Self::cache_path(folder))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Remove the cache file. Ok(false) when there was none.
    pub fn clear(folder: &Path) -> Result<bool> {
        let cache_path = Self::cache_path(folder);
        if cache_path.exists() {
            std::fs::remove_file(cache_path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Snapshot of the live caches.
    ///
    /// Empty outcomes (REVIEW enrichments, empty product lists) stay in memory
    /// only, so the next invocation asks the registries again.
    pub fn from_cache(cache: &RegistryCache) -> Self {
        let enrichment = cache
            .enrichment
            .snapshot()
            .into_iter()
            .filter(|(_, record)| record.confidence != Confidence::Review)
            .collect();

        let products = cache
            .products
            .snapshot()
            .into_iter()
            .filter(|(_, products)| !products.is_empty())
            .map(|(key, products)| ProductCacheEntry {
                term: key.term,
                include_revoked: key.include_revoked,
                products,
            })
            .collect();

        Self {
            version: Self::CURRENT_VERSION,
            enrichment,
            products,
        }
    }

    /// Seed the live caches
    pub fn restore_into(self, cache: &RegistryCache) {
        debug!(
            enrichment = self.enrichment.len(),
            products = self.products.len(),
            "restoring cache"
        );
        for (key, record) in self.enrichment {
            cache.enrichment.insert(key, record);
        }
        for entry in self.products {
            cache
                .products
                .insert(ProductKey::new(&entry.term, entry.include_revoked), entry.products);
        }
    }

    pub fn len(&self) -> usize {
        self.enrichment.len() + self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn enrichment_len(&self) -> usize {
        self.enrichment.len()
    }

    pub fn product_len(&self) -> usize {
        self.products.len()
    }
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            enrichment: HashMap::new(),
            products: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_call() {
        let cache: LookupCache<String, u32> = LookupCache::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok::<_, ()>(42)
        };

        let (a, b, c) = tokio::join!(
            cache.get_or_try_fetch("k".to_string(), fetch),
            cache.get_or_try_fetch("k".to_string(), fetch),
            cache.get_or_try_fetch("k".to_string(), fetch),
        );

        assert_eq!((a, b, c), (Ok(42), Ok(42), Ok(42)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_stored() {
        let cache: LookupCache<String, u32> = LookupCache::new();

        let first = cache
            .get_or_try_fetch("k".to_string(), || async { Err::<u32, _>("cancelled") })
            .await;
        assert_eq!(first, Err("cancelled"));
        assert!(cache.get(&"k".to_string()).is_none());

        let second = cache
            .get_or_try_fetch("k".to_string(), || async { Ok::<_, &str>(7) })
            .await;
        assert_eq!(second, Ok(7));
    }

    #[test]
    fn test_clear() {
        let cache = RegistryCache::new();
        cache.products.insert(ProductKey::new("아토르바스타틴", false), vec![]);
        cache.enrichment.insert("LIPITOR".into(), EnrichmentRecord::default());
        assert_eq!(cache.products.len(), 1);

        cache.clear();
        assert!(cache.products.is_empty());
        assert!(cache.enrichment.is_empty());
    }

    #[test]
    fn test_product_key_trims_term() {
        assert_eq!(
            ProductKey::new("  로사르탄 ", true),
            ProductKey::new("로사르탄", true)
        );
        assert_ne!(
            ProductKey::new("로사르탄", true),
            ProductKey::new("로사르탄", false)
        );
    }
}
