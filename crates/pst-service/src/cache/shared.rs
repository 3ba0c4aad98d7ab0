//! The shared (cross-process) cache tier.

use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::RedisSettings;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const SCAN_BATCH: usize = 500;

#[derive(Debug, Error)]
pub enum CacheError {
  #[error("redis: {0}")]
  Redis(#[from] redis::RedisError),

  #[error("shared cache unavailable: {0}")]
  Unavailable(String),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// A string-keyed store of serialized payloads visible to every process.
///
/// Implementations may fail freely; [`super::StatementCache`] logs the error
/// and carries on as if the key were absent.
pub trait SharedCache: Send + Sync {
  fn get(&self, key: &str) -> CacheResult<Option<String>>;

  fn put(&self, key: &str, payload: &str) -> CacheResult<()>;

  fn evict(&self, key: &str) -> CacheResult<()>;

  /// Remove every key this cache owns.
  fn clear(&self) -> CacheResult<()>;
}

// ─── Redis ───────────────────────────────────────────────────────────────────

/// [`SharedCache`] on a Redis server.
///
/// Keys are namespaced with a prefix. The connection is opened on first use
/// and discarded after any error, so the next call reconnects.
pub struct RedisCache {
  client: redis::Client,
  prefix: String,
  ttl:    Duration,
  conn:   Mutex<Option<redis::Connection>>,
}

impl RedisCache {
  pub fn new(settings: &RedisSettings) -> CacheResult<Self> {
    let client = redis::Client::open(settings.url.as_str())?;
    info!(url = %settings.url, prefix = %settings.prefix, "shared cache configured");
    Ok(Self {
      client,
      prefix: settings.prefix.clone(),
      ttl: settings.ttl(),
      conn: Mutex::new(None),
    })
  }

  fn key(&self, key: &str) -> String { format!("{}{key}", self.prefix) }

  fn with_conn<T>(
    &self,
    f: impl FnOnce(&mut redis::Connection) -> redis::RedisResult<T>,
  ) -> CacheResult<T> {
    let mut slot = self.conn.lock();
    if slot.is_none() {
      debug!("connecting to shared cache");
      *slot = Some(self.client.get_connection_with_timeout(CONNECT_TIMEOUT)?);
    }
    let Some(conn) = slot.as_mut() else {
      return Err(CacheError::Unavailable("no connection".to_owned()));
    };
    match f(conn) {
      Ok(value) => Ok(value),
      Err(e) => {
        *slot = None;
        Err(e.into())
      }
    }
  }
}

impl SharedCache for RedisCache {
  fn get(&self, key: &str) -> CacheResult<Option<String>> {
    let key = self.key(key);
    self.with_conn(|c| redis::cmd("GET").arg(&key).query(c))
  }

  fn put(&self, key: &str, payload: &str) -> CacheResult<()> {
    let key = self.key(key);
    let ttl = self.ttl.as_secs();
    self.with_conn(|c| {
      let mut cmd = redis::cmd("SET");
      cmd.arg(&key).arg(payload);
      if ttl > 0 {
        cmd.arg("EX").arg(ttl);
      }
      cmd.query(c)
    })
  }

  fn evict(&self, key: &str) -> CacheResult<()> {
    let key = self.key(key);
    self.with_conn(|c| redis::cmd("DEL").arg(&key).query(c))
  }

  fn clear(&self) -> CacheResult<()> {
    let pattern = format!("{}*", self.prefix);
    self.with_conn(|c| {
      let mut cursor: u64 = 0;
      loop {
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
          .arg(cursor)
          .arg("MATCH")
          .arg(&pattern)
          .arg("COUNT")
          .arg(SCAN_BATCH)
          .query(c)?;
        if !keys.is_empty() {
          redis::cmd("DEL").arg(&keys).query::<()>(c)?;
        }
        if next == 0 {
          return Ok(());
        }
        cursor = next;
      }
    })
  }
}
