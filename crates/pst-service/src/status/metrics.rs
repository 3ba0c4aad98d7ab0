//! Process metrics and request counters.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use pst_core::{RequestStatus, SystemStatus};

use crate::cache::StatementCache;

/// Interactive operations that are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
  GetEntity,
  GetRandom,
  GetStatement,
  UpdateStatement,
  GetStatus,
}

pub struct Metrics {
  startup:          DateTime<Utc>,
  version:          String,
  get_entity:       AtomicU64,
  get_random:       AtomicU64,
  get_statement:    AtomicU64,
  update_statement: AtomicU64,
  get_status:       AtomicU64,
}

impl Default for Metrics {
  fn default() -> Self { Self::new(env!("CARGO_PKG_VERSION")) }
}

impl Metrics {
  pub fn new(version: impl Into<String>) -> Self {
    Self {
      startup:          Utc::now(),
      version:          version.into(),
      get_entity:       AtomicU64::new(0),
      get_random:       AtomicU64::new(0),
      get_statement:    AtomicU64::new(0),
      update_statement: AtomicU64::new(0),
      get_status:       AtomicU64::new(0),
    }
  }

  pub fn record(&self, request: Request) {
    let counter = match request {
      Request::GetEntity => &self.get_entity,
      Request::GetRandom => &self.get_random,
      Request::GetStatement => &self.get_statement,
      Request::UpdateStatement => &self.update_statement,
      Request::GetStatus => &self.get_status,
    };
    counter.fetch_add(1, Ordering::Relaxed);
  }

  pub fn requests(&self) -> RequestStatus {
    RequestStatus {
      get_entity:       self.get_entity.load(Ordering::Relaxed),
      get_random:       self.get_random.load(Ordering::Relaxed),
      get_statement:    self.get_statement.load(Ordering::Relaxed),
      update_statement: self.update_statement.load(Ordering::Relaxed),
      get_status:       self.get_status.load(Ordering::Relaxed),
    }
  }

  pub fn system(&self, cache: &StatementCache) -> SystemStatus {
    let memory = MemoryUsage::current();
    SystemStatus {
      startup:        self.startup,
      version:        self.version.clone(),
      cache_hits:     cache.hits(),
      cache_misses:   cache.misses(),
      rss:            memory.rss,
      shared_memory:  memory.shared,
      private_memory: memory.private,
    }
  }
}

// ─── Memory ──────────────────────────────────────────────────────────────────

/// Memory figures in bytes. All zero where `/proc` is unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
  pub rss:     u64,
  pub shared:  u64,
  pub private: u64,
}

impl MemoryUsage {
  pub fn current() -> Self {
    std::fs::read_to_string("/proc/self/status")
      .map(|s| Self::parse(&s))
      .unwrap_or_default()
  }

  /// Parse the `Vm*`/`Rss*` lines of a `/proc/<pid>/status` file.
  pub fn parse(status: &str) -> Self {
    let mut usage = Self::default();
    for line in status.lines() {
      let Some((field, rest)) = line.split_once(':') else { continue };
      let Some(kb) = rest.split_whitespace().next().and_then(|v| v.parse::<u64>().ok()) else {
        continue;
      };
      let bytes = kb * 1024;
      match field {
        "VmRSS" => usage.rss = bytes,
        "RssFile" | "RssShmem" => usage.shared += bytes,
        "RssAnon" => usage.private = bytes,
        _ => {}
      }
    }
    usage
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_proc_status() {
    let status = "\
Name:\tpst-admin
VmPeak:\t  200000 kB
VmRSS:\t    5000 kB
RssAnon:\t    3000 kB
RssFile:\t    1500 kB
RssShmem:\t     500 kB
Threads:\t3
";
    let usage = MemoryUsage::parse(status);
    assert_eq!(usage.rss, 5000 * 1024);
    assert_eq!(usage.private, 3000 * 1024);
    assert_eq!(usage.shared, 2000 * 1024);
  }

  #[test]
  fn counters_are_independent() {
    let metrics = Metrics::new("test");
    metrics.record(Request::GetEntity);
    metrics.record(Request::GetEntity);
    metrics.record(Request::UpdateStatement);
    let requests = metrics.requests();
    assert_eq!(requests.get_entity, 2);
    assert_eq!(requests.update_statement, 1);
    assert_eq!(requests.get_status, 0);
  }
}
