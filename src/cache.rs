use std::time::{Duration, Instant};

use dashmap::DashMap;

/// A TTL cache seam so advisory caches (key-sets, counters) can swap backends
/// without touching the code that consults them.
pub trait Cache<V: Clone>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;
    fn set(&self, key: &str, value: V, ttl: Duration);
    fn evict(&self, key: &str);
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Process-local cache with a hard entry cap. When full, expired entries are
/// purged first; if still full, the entry closest to expiry is dropped.
pub struct MemoryCache<V> {
    entries: DashMap<String, Entry<V>>,
    capacity: usize,
}

impl<V> MemoryCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    fn drop_soonest_expiring(&self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.expires_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = victim {
            self.entries.remove(&key);
        }
    }
}

impl<V: Clone + Send + Sync> Cache<V> for MemoryCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    fn set(&self, key: &str, value: V, ttl: Duration) {
        if !self.entries.contains_key(key) && self.entries.len() >= self.capacity {
            self.purge_expired();
            if self.entries.len() >= self.capacity {
                self.drop_soonest_expiring();
            }
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn evict(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_live_entries() {
        let cache = MemoryCache::new(4);
        cache.set("a", 1, Duration::from_secs(60));
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let cache = MemoryCache::new(4);
        cache.set("a", 1, Duration::ZERO);
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn evict_removes_entry() {
        let cache = MemoryCache::new(4);
        cache.set("a", 1, Duration::from_secs(60));
        cache.evict("a");
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn capacity_is_enforced() {
        let cache = MemoryCache::new(2);
        cache.set("a", 1, Duration::from_secs(60));
        cache.set("b", 2, Duration::from_secs(120));
        cache.set("c", 3, Duration::from_secs(180));
        assert_eq!(cache.len(), 2);
        // "a" expires soonest, so it is the one dropped.
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn overwriting_does_not_grow_the_cache() {
        let cache = MemoryCache::new(2);
        cache.set("a", 1, Duration::from_secs(60));
        cache.set("a", 2, Duration::from_secs(60));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some(2));
    }
}
