//! Two-tier read-through cache for query results.
//!
//! Lookups try the in-process LRU first, then the shared tier, then the
//! loader. Whatever is loaded is written back to both tiers. Payloads are
//! JSON so the shared tier can be read by any process.

mod key;
mod local;
mod shared;

use std::{
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
  time::Duration,
};

pub use key::{ALL_DATASETS, CacheKey};
pub use local::LocalCache;
use serde::{Serialize, de::DeserializeOwned};
pub use shared::{CacheError, CacheResult, RedisCache, SharedCache};
use tracing::{debug, warn};

use crate::{Result, config::Settings};

pub struct StatementCache {
  local:  LocalCache<Arc<str>>,
  shared: Option<Box<dyn SharedCache>>,
  hits:   AtomicU64,
  misses: AtomicU64,
}

impl StatementCache {
  pub fn new(capacity: usize, ttl: Duration, shared: Option<Box<dyn SharedCache>>) -> Self {
    Self {
      local: LocalCache::new(capacity, ttl),
      shared,
      hits: AtomicU64::new(0),
      misses: AtomicU64::new(0),
    }
  }

  /// Build both tiers from configuration. Redis is only connected lazily, so
  /// an unreachable server does not fail startup.
  pub fn from_settings(settings: &Settings) -> Result<Self> {
    let shared = match &settings.redis {
      Some(redis) => Some(Box::new(RedisCache::new(redis)?) as Box<dyn SharedCache>),
      None => None,
    };
    Ok(Self::new(settings.cache.capacity, settings.cache.ttl(), shared))
  }

  pub fn has_shared(&self) -> bool { self.shared.is_some() }

  /// Look `key` up in both tiers. A shared hit is copied into the local tier.
  pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
    let payload = self.local.get(key.as_str()).or_else(|| {
      let payload: Arc<str> = self.shared_get(key)?.into();
      self.local.put(key.as_str(), payload.clone());
      Some(payload)
    });

    let Some(payload) = payload else {
      self.misses.fetch_add(1, Ordering::Relaxed);
      return None;
    };

    match serde_json::from_str(&payload) {
      Ok(value) => {
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(value)
      }
      Err(e) => {
        warn!(key = %key, "discarding undecodable cache entry: {e}");
        self.evict(key);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
      }
    }
  }

  /// Store `value` in both tiers.
  pub fn put<T: Serialize>(&self, key: &CacheKey, value: &T) {
    let Some(payload) = encode(key, value) else { return };
    if let Some(shared) = &self.shared
      && let Err(e) = shared.put(key.as_str(), &payload)
    {
      warn!(key = %key, "shared cache write failed: {e}");
    }
    self.local.put(key.as_str(), payload.into());
  }

  /// Store `value` in the shared tier only.
  pub fn put_shared<T: Serialize>(&self, key: &CacheKey, value: &T) -> CacheResult<()> {
    let Some(shared) = &self.shared else { return Ok(()) };
    match encode(key, value) {
      Some(payload) => shared.put(key.as_str(), &payload),
      None => Ok(()),
    }
  }

  /// Return the cached value for `key`, or run `load` and cache its result.
  /// Errors from `load` are returned and nothing is cached.
  pub fn get_or_load<T, E>(
    &self,
    key: &CacheKey,
    load: impl FnOnce() -> Result<T, E>,
  ) -> Result<T, E>
  where
    T: Serialize + DeserializeOwned,
  {
    if let Some(value) = self.get(key) {
      return Ok(value);
    }
    let value = load()?;
    self.put(key, &value);
    Ok(value)
  }

  pub fn evict(&self, key: &CacheKey) {
    self.local.evict(key.as_str());
    if let Some(shared) = &self.shared
      && let Err(e) = shared.evict(key.as_str())
    {
      warn!(key = %key, "shared cache evict failed: {e}");
    }
  }

  pub fn clear(&self) {
    self.local.clear();
    if let Some(shared) = &self.shared
      && let Err(e) = shared.clear()
    {
      warn!("shared cache clear failed: {e}");
    }
    debug!("cache cleared");
  }

  pub fn hits(&self) -> u64 { self.hits.load(Ordering::Relaxed) }

  pub fn misses(&self) -> u64 { self.misses.load(Ordering::Relaxed) }

  fn shared_get(&self, key: &CacheKey) -> Option<String> {
    match self.shared.as_ref()?.get(key.as_str()) {
      Ok(payload) => payload,
      Err(e) => {
        warn!(key = %key, "shared cache read failed: {e}");
        None
      }
    }
  }
}

fn encode<T: Serialize>(key: &CacheKey, value: &T) -> Option<String> {
  match serde_json::to_string(value) {
    Ok(payload) => Some(payload),
    Err(e) => {
      warn!(key = %key, "cannot encode cache entry: {e}");
      None
    }
  }
}

#[cfg(test)]
pub(crate) mod fake {
  use std::collections::HashMap;

  use parking_lot::Mutex;

  use super::{CacheError, CacheResult, SharedCache};

  /// A shared tier that lives in a map.
  #[derive(Default)]
  pub struct MemoryCache {
    pub entries: Mutex<HashMap<String, String>>,
  }

  impl SharedCache for std::sync::Arc<MemoryCache> {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
      Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &str, payload: &str) -> CacheResult<()> {
      self.entries.lock().insert(key.to_owned(), payload.to_owned());
      Ok(())
    }

    fn evict(&self, key: &str) -> CacheResult<()> {
      self.entries.lock().remove(key);
      Ok(())
    }

    fn clear(&self) -> CacheResult<()> {
      self.entries.lock().clear();
      Ok(())
    }
  }

  /// A shared tier that is never reachable.
  pub struct DownCache;

  impl SharedCache for DownCache {
    fn get(&self, _: &str) -> CacheResult<Option<String>> { Err(down()) }

    fn put(&self, _: &str, _: &str) -> CacheResult<()> { Err(down()) }

    fn evict(&self, _: &str) -> CacheResult<()> { Err(down()) }

    fn clear(&self) -> CacheResult<()> { Err(down()) }
  }

  fn down() -> CacheError { CacheError::Unavailable("connection refused".to_owned()) }
}
