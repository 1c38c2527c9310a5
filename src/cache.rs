//! Small TTL map used for advisory caching.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;

/// A cached value and when it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<V> {
    pub value: V,
    pub stored_at: DateTime<Utc>,
}

pub struct TtlCache<K, V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<K, Cached<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fresh entry for `key`, if any. An entry is fresh while `age < ttl`.
    pub fn get(&self, key: &K) -> Option<Cached<V>> {
        let now = self.clock.now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| now - entry.stored_at < self.ttl)
            .cloned()
    }

    /// Store `value` and drop every expired entry.
    pub fn insert(&self, key: K, value: V) -> DateTime<Utc> {
        let now = self.clock.now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let ttl = self.ttl;
        entries.retain(|_, entry| now - entry.stored_at < ttl);
        entries.insert(
            key,
            Cached {
                value,
                stored_at: now,
            },
        );
        now
    }

    pub fn invalidate(&self, key: &K) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    #[test]
    fn entries_expire_after_ttl() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::seconds(30), clock.clone());

        let stored_at = cache.insert("a".to_string(), 1);
        clock.advance(Duration::seconds(29));
        let hit = cache.get(&"a".to_string()).unwrap();
        assert_eq!(hit.value, 1);
        assert_eq!(hit.stored_at, stored_at);

        clock.advance(Duration::seconds(1));
        assert!(cache.get(&"a".to_string()).is_none());
    }

    #[test]
    fn insert_purges_expired_entries() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::seconds(10), clock.clone());

        cache.insert("old", 1);
        clock.advance(Duration::seconds(11));
        cache.insert("new", 2);
        assert_eq!(cache.len(), 1);

        cache.invalidate(&"new");
        assert!(cache.is_empty());
    }
}
