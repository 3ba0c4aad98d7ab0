//! In-process LRU tier.

use std::{
  num::NonZeroUsize,
  time::{Duration, Instant},
};

use lru::LruCache;
use parking_lot::Mutex;

/// A bounded LRU map whose entries also expire after a fixed TTL.
pub struct LocalCache<V> {
  entries: Mutex<LruCache<String, (Instant, V)>>,
  ttl:     Duration,
}

impl<V: Clone> LocalCache<V> {
  /// A capacity of zero is treated as one.
  pub fn new(capacity: usize, ttl: Duration) -> Self {
    let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
    Self { entries: Mutex::new(LruCache::new(capacity)), ttl }
  }

  pub fn get(&self, key: &str) -> Option<V> {
    let mut entries = self.entries.lock();
    let expired = match entries.get(key) {
      None => return None,
      Some((stored, _)) => stored.elapsed() >= self.ttl,
    };
    if expired {
      entries.pop(key);
      return None;
    }
    entries.get(key).map(|(_, v)| v.clone())
  }

  pub fn put(&self, key: impl Into<String>, value: V) {
    self.entries.lock().put(key.into(), (Instant::now(), value));
  }

  pub fn evict(&self, key: &str) { self.entries.lock().pop(key); }

  pub fn clear(&self) { self.entries.lock().clear(); }

  pub fn len(&self) -> usize { self.entries.lock().len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn least_recently_used_goes_first() {
    let cache = LocalCache::new(2, Duration::from_secs(60));
    cache.put("a", 1);
    cache.put("b", 2);
    assert_eq!(cache.get("a"), Some(1));
    cache.put("c", 3);

    assert_eq!(cache.get("b"), None);
    assert_eq!(cache.get("a"), Some(1));
    assert_eq!(cache.get("c"), Some(3));
  }

  #[test]
  fn expired_entries_are_dropped() {
    let cache = LocalCache::new(4, Duration::ZERO);
    cache.put("a", 1);
    assert_eq!(cache.get("a"), None);
    assert!(cache.is_empty());
  }

  #[test]
  fn evict_and_clear() {
    let cache = LocalCache::new(4, Duration::from_secs(60));
    cache.put("a", 1);
    cache.put("b", 2);
    cache.evict("a");
    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.len(), 1);
    cache.clear();
    assert!(cache.is_empty());
  }
}
