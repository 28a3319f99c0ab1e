//! Bounded result cache with insertion-order eviction
//!
//! Backed by an [`LruCache`] that is only touched through non-promoting
//! operations (`peek`, `peek_mut`, `push` of new keys), so its recency order
//! is insertion order and eviction drops the earliest-inserted key.

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

pub struct FifoCache<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq, V: Clone> FifoCache<K, V> {
    /// A capacity of zero is treated as one
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up without affecting eviction order
    pub async fn get(&self, key: &K) -> Option<V> {
        self.entries.lock().await.peek(key).cloned()
    }

    /// Insert a value. An existing key keeps its position and gets the new value.
    pub async fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.peek_mut(&key) {
            *existing = value;
        } else {
            entries.push(key, value);
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_evicts_earliest_inserted() {
        let cache = FifoCache::new(100);
        for i in 0..101 {
            cache.insert(format!("key-{i}"), i).await;
        }
        assert_eq!(cache.len().await, 100);
        assert_eq!(cache.get(&"key-0".to_string()).await, None);
        assert_eq!(cache.get(&"key-1".to_string()).await, Some(1));
        assert_eq!(cache.get(&"key-100".to_string()).await, Some(100));
    }

    #[tokio::test]
    async fn test_lookups_do_not_refresh_position() {
        let cache = FifoCache::new(2);
        cache.insert("a", 1).await;
        cache.insert("b", 2).await;
        // a recency cache would now evict "b"
        assert_eq!(cache.get(&"a").await, Some(1));
        cache.insert("c", 3).await;

        assert_eq!(cache.get(&"a").await, None);
        assert_eq!(cache.get(&"b").await, Some(2));
    }

    #[tokio::test]
    async fn test_reinsert_replaces_in_place() {
        let cache = FifoCache::new(2);
        cache.insert("a", 1).await;
        cache.insert("b", 2).await;
        cache.insert("a", 10).await;
        assert_eq!(cache.get(&"a").await, Some(10));

        // "a" is still the oldest entry
        cache.insert("c", 3).await;
        assert_eq!(cache.get(&"a").await, None);
        assert_eq!(cache.get(&"b").await, Some(2));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = FifoCache::new(4);
        cache.insert(1, "x").await;
        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
