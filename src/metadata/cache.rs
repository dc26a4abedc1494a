use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use super::{DictionarySource, MetadataAccess, MetadataError, TableSchema};
use crate::config::CacheConfig;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DictionaryKey {
    tables: Vec<String>,
    access: MetadataAccess,
}

struct CachedEntry {
    schemas: Arc<Vec<TableSchema>>,
    fetched_at: Instant,
}

/// Table descriptions keyed by (tables, host, token), bounded in size and age.
///
/// Lookups are not coalesced: two concurrent misses for the same key both hit
/// the source and the later one wins the slot.
pub struct DictionaryCache {
    source: Arc<dyn DictionarySource>,
    entries: RwLock<HashMap<DictionaryKey, CachedEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl DictionaryCache {
    pub fn new(source: Arc<dyn DictionarySource>, config: &CacheConfig) -> Self {
        Self {
            source,
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::from_secs(config.ttl_secs),
            max_entries: config.max_entries,
        }
    }

    pub async fn table_schemas(
        &self,
        tables: &[String],
        access: &MetadataAccess,
    ) -> Result<Arc<Vec<TableSchema>>, MetadataError> {
        let key = DictionaryKey {
            tables: tables.to_vec(),
            access: access.clone(),
        };

        if let Some(entry) = self.entries.read().await.get(&key) {
            if entry.fetched_at.elapsed() < self.ttl {
                debug!("Dictionary cache hit for {:?}", key.tables);
                return Ok(Arc::clone(&entry.schemas));
            }
        }

        debug!("Dictionary cache miss for {:?}", key.tables);
        let schemas = Arc::new(self.source.table_schemas(tables, access).await?);

        if self.max_entries > 0 {
            let mut entries = self.entries.write().await;
            entries.retain(|_, entry| entry.fetched_at.elapsed() < self.ttl);

            while entries.len() >= self.max_entries && !entries.contains_key(&key) {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.fetched_at)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(oldest) => {
                        entries.remove(&oldest);
                    }
                    None => break,
                }
            }

            entries.insert(
                key,
                CachedEntry {
                    schemas: Arc::clone(&schemas),
                    fetched_at: Instant::now(),
                },
            );
        }

        Ok(schemas)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DictionarySource for CountingSource {
        async fn table_schemas(
            &self,
            tables: &[String],
            _access: &MetadataAccess,
        ) -> Result<Vec<TableSchema>, MetadataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(tables.iter().map(|t| TableSchema::new(t.as_str(), "d", "")).collect())
        }
    }

    fn access() -> MetadataAccess {
        MetadataAccess {
            host: Some("https://om.example.org".to_string()),
            token: "jwt".to_string(),
        }
    }

    fn cache(source: Arc<CountingSource>, ttl_secs: u64, max_entries: usize) -> DictionaryCache {
        DictionaryCache::new(source, &CacheConfig { ttl_secs, max_entries })
    }

    #[tokio::test]
    async fn repeated_lookups_hit_the_cache() {
        let source = Arc::new(CountingSource::default());
        let cache = cache(Arc::clone(&source), 3600, 8);
        let tables = vec!["T".to_string()];

        let first = cache.table_schemas(&tables, &access()).await.unwrap();
        let second = cache.table_schemas(&tables, &access()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_tokens_are_different_keys() {
        let source = Arc::new(CountingSource::default());
        let cache = cache(Arc::clone(&source), 3600, 8);
        let tables = vec!["T".to_string()];
        let other = MetadataAccess {
            token: "rotated".to_string(),
            ..access()
        };

        cache.table_schemas(&tables, &access()).await.unwrap();
        cache.table_schemas(&tables, &other).await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let source = Arc::new(CountingSource::default());
        let cache = cache(Arc::clone(&source), 0, 8);
        let tables = vec!["T".to_string()];

        cache.table_schemas(&tables, &access()).await.unwrap();
        cache.table_schemas(&tables, &access()).await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(cache.len().await <= 1);
    }

    #[tokio::test]
    async fn never_grows_past_capacity() {
        let source = Arc::new(CountingSource::default());
        let cache = cache(Arc::clone(&source), 3600, 2);

        for name in ["A", "B", "C"] {
            cache
                .table_schemas(&[name.to_string()], &access())
                .await
                .unwrap();
        }
        assert_eq!(cache.len().await, 2);

        // "A" was the oldest entry and must have been evicted.
        cache.table_schemas(&["A".to_string()], &access()).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);

        cache.table_schemas(&["C".to_string()], &access()).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn full_cache_drops_every_expired_entry() {
        let source = Arc::new(CountingSource::default());
        let cache = cache(Arc::clone(&source), 1, 2);

        cache.table_schemas(&["A".to_string()], &access()).await.unwrap();
        cache.table_schemas(&["B".to_string()], &access()).await.unwrap();
        assert_eq!(cache.len().await, 2);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        cache.table_schemas(&["C".to_string()], &access()).await.unwrap();

        // both stale entries go, not just the oldest one
        assert_eq!(cache.len().await, 1);
        cache.table_schemas(&["C".to_string()], &access()).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_capacity_disables_caching() {
        let source = Arc::new(CountingSource::default());
        let cache = cache(Arc::clone(&source), 3600, 0);
        let tables = vec!["T".to_string()];

        cache.table_schemas(&tables, &access()).await.unwrap();
        cache.table_schemas(&tables, &access()).await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 0);
    }
}
