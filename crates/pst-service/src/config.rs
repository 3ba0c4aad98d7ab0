//! Runtime configuration.
//!
//! Settings come from an optional TOML file, then `PST_`-prefixed
//! environment variables, with `__` separating nested keys
//! (`PST_DATABASE__PATH`, `PST_REDIS__URL`). Every field has a default.

use std::{path::PathBuf, time::Duration};

use pst_core::RetryPolicy;
use serde::Deserialize;

use crate::Result;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub database:      DatabaseSettings,
  /// Shared cache tier; absent means local caching only.
  pub redis:         Option<RedisSettings>,
  pub cache:         LocalCacheSettings,
  pub cache_refresh: CacheRefreshSettings,
  pub status:        StatusSettings,
  pub activity:      ActivitySettings,
  pub retry:         RetryPolicy,
  pub import:        ImportSettings,
}

impl Settings {
  /// Load from `file` (if it exists) and the environment.
  pub fn load(file: Option<PathBuf>) -> Result<Self> {
    let mut builder = config::Config::builder();
    if let Some(path) = file {
      builder = builder.add_source(config::File::from(path).required(false));
    }
    let settings = builder
      .add_source(
        config::Environment::with_prefix("PST")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()?;
    Ok(settings)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
  pub path:      PathBuf,
  pub pool_size: u32,
}

impl Default for DatabaseSettings {
  fn default() -> Self { Self { path: PathBuf::from("primarysources.db"), pool_size: 8 } }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
  pub url:      String,
  /// Prepended to every key so several deployments can share a server.
  pub prefix:   String,
  pub ttl_secs: u64,
}

impl Default for RedisSettings {
  fn default() -> Self {
    Self {
      url:      "redis://127.0.0.1/".to_owned(),
      prefix:   "PST::".to_owned(),
      ttl_secs: 24 * 60 * 60,
    }
  }
}

impl RedisSettings {
  pub fn ttl(&self) -> Duration { Duration::from_secs(self.ttl_secs) }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalCacheSettings {
  pub capacity: usize,
  pub ttl_secs: u64,
}

impl Default for LocalCacheSettings {
  fn default() -> Self { Self { capacity: 10_000, ttl_secs: 300 } }
}

impl LocalCacheSettings {
  pub fn ttl(&self) -> Duration { Duration::from_secs(self.ttl_secs) }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheRefreshSettings {
  /// Run the background shared-cache refresher.
  pub enabled:       bool,
  pub interval_secs: u64,
  pub page_size:     usize,
}

impl Default for CacheRefreshSettings {
  fn default() -> Self { Self { enabled: false, interval_secs: 6 * 60 * 60, page_size: 10_000 } }
}

impl CacheRefreshSettings {
  pub fn interval(&self) -> Duration { Duration::from_secs(self.interval_secs) }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusSettings {
  /// Longest the aggregator sleeps between dirty checks.
  pub refresh_interval_secs: u64,
  pub top_users:             usize,
}

impl Default for StatusSettings {
  fn default() -> Self { Self { refresh_interval_secs: 60, top_users: 10 } }
}

impl StatusSettings {
  pub fn refresh_interval(&self) -> Duration { Duration::from_secs(self.refresh_interval_secs) }
}

/// Shape of the dashboard activity log.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActivitySettings {
  pub period_days: u32,
  pub periods:     u32,
  pub top_users:   usize,
}

impl Default for ActivitySettings {
  fn default() -> Self { Self { period_days: 7, periods: 12, top_users: 10 } }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
  /// Statements per commit during bulk import.
  pub batch_size:     usize,
  /// Pairs between progress reports (and commits) in the duplicate sweep.
  pub dedup_progress: u64,
}

impl Default for ImportSettings {
  fn default() -> Self { Self { batch_size: 100_000, dedup_progress: 10_000 } }
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn defaults_without_sources() {
    let settings = Settings::load(None).unwrap();
    assert_eq!(settings.database.pool_size, 8);
    assert_eq!(settings.retry.max_retries, 3);
    assert_eq!(settings.import.batch_size, 100_000);
  }

  #[test]
  fn missing_file_is_not_an_error() {
    let settings = Settings::load(Some(PathBuf::from("/nonexistent/pst.toml"))).unwrap();
    assert_eq!(settings.status.top_users, 10);
  }

  #[test]
  fn file_overrides_nested_keys() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
      file,
      r#"
[database]
path = "/var/lib/pst/statements.db"

[redis]
url = "redis://cache.internal/"

[retry]
initial_backoff = 250
"#
    )
    .unwrap();

    let settings = Settings::load(Some(file.path().to_path_buf())).unwrap();
    assert_eq!(settings.database.path, PathBuf::from("/var/lib/pst/statements.db"));
    assert_eq!(settings.database.pool_size, 8);

    let redis = settings.redis.unwrap();
    assert_eq!(redis.url, "redis://cache.internal/");
    assert_eq!(redis.prefix, "PST::");
    assert_eq!(settings.retry.initial_backoff, Duration::from_millis(250));
    assert_eq!(settings.retry.max_retries, 3);
  }
}
