//! Time-bounded in-memory caches for analysis results.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub payload: Arc<V>,
    pub created_at: DateTime<Utc>,
    inserted: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted) > ttl
    }
}

/// Keyed cache whose entries expire `ttl` after insertion.
///
/// Expired entries are swept out on the next miss or insert.
#[derive(Debug)]
pub struct TtlCache<V> {
    name: &'static str,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V> TtlCache<V> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &str) -> Option<Arc<V>> {
        self.get_at(key, Instant::now()).await
    }

    pub async fn get_at(&self, key: &str, now: Instant) -> Option<Arc<V>> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key).filter(|e| !e.is_expired(now, self.ttl)) {
                debug!(cache = self.name, key, "cache hit");
                return Some(Arc::clone(&entry.payload));
            }
        }

        let mut entries = self.entries.write().await;
        // Another task may have refreshed the entry between the two locks.
        if let Some(entry) = entries.get(key).filter(|e| !e.is_expired(now, self.ttl)) {
            return Some(Arc::clone(&entry.payload));
        }
        self.evict_expired(&mut entries, now);
        None
    }

    pub async fn insert(&self, key: String, payload: Arc<V>) {
        self.insert_at(key, payload, Instant::now()).await;
    }

    pub async fn insert_at(&self, key: String, payload: Arc<V>, now: Instant) {
        let entry = CacheEntry {
            key: key.clone(),
            payload,
            created_at: Utc::now(),
            inserted: now,
        };
        let mut entries = self.entries.write().await;
        self.evict_expired(&mut entries, now);
        entries.insert(key, entry);
    }

    fn evict_expired(&self, entries: &mut HashMap<String, CacheEntry<V>>, now: Instant) {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now, self.ttl));
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(cache = self.name, evicted, "evicted expired entries");
        }
    }

    pub async fn entry(&self, key: &str) -> Option<CacheEntry<V>> {
        self.entries.read().await.get(key).map(|entry| CacheEntry {
            key: entry.key.clone(),
            payload: Arc::clone(&entry.payload),
            created_at: entry.created_at,
            inserted: entry.inserted,
        })
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_shared_payload_within_ttl() {
        let cache = TtlCache::new("test", Duration::from_secs(60));
        let payload = Arc::new(42_u32);
        cache.insert("k".to_string(), Arc::clone(&payload)).await;

        let hit = cache.get("k").await.expect("cached");
        assert!(Arc::ptr_eq(&hit, &payload));
        assert!(cache.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_evicted_on_lookup() {
        let cache = TtlCache::new("test", Duration::from_secs(10));
        let inserted = Instant::now();
        cache
            .insert_at("k".to_string(), Arc::new("v"), inserted)
            .await;

        assert!(cache
            .get_at("k", inserted + Duration::from_secs(10))
            .await
            .is_some());
        assert_eq!(cache.len().await, 1);

        assert!(cache
            .get_at("k", inserted + Duration::from_secs(11))
            .await
            .is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn one_off_keys_do_not_accumulate() {
        let cache = TtlCache::new("test", Duration::from_secs(60));
        let inserted = Instant::now();
        for i in 0..1000 {
            cache
                .insert_at(format!("request-{i}"), Arc::new(i), inserted)
                .await;
        }
        assert_eq!(cache.len().await, 1000);

        let later = inserted + Duration::from_secs(3600);
        assert!(cache.get_at("never-seen", later).await.is_none());
        assert!(cache.is_empty().await);

        cache.insert_at("fresh".to_string(), Arc::new(1), later).await;
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn miss_keeps_live_entries() {
        let cache = TtlCache::new("test", Duration::from_secs(60));
        let inserted = Instant::now();
        cache.insert_at("old".to_string(), Arc::new(1), inserted).await;
        let later = inserted + Duration::from_secs(45);
        cache.insert_at("new".to_string(), Arc::new(2), later).await;

        assert!(cache.get_at("missing", later).await.is_none());
        assert_eq!(cache.len().await, 2);

        // Only the older entry has outlived its ttl.
        let expiry = inserted + Duration::from_secs(61);
        cache.insert_at("newest".to_string(), Arc::new(3), expiry).await;
        assert!(cache.entry("old").await.is_none());
        assert!(cache.get_at("new", expiry).await.is_some());
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn entry_exposes_metadata() {
        let cache = TtlCache::new("test", Duration::from_secs(60));
        let before = Utc::now();
        cache.insert("k".to_string(), Arc::new(1)).await;
        let entry = cache.entry("k").await.expect("entry");
        assert_eq!(entry.key, "k");
        assert!(entry.created_at >= before);

        cache.clear().await;
        assert!(cache.entry("k").await.is_none());
    }
}
