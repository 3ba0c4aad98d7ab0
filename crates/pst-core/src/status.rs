//! Aggregate status and activity report types.
//!
//! These are plain data; the store fills in the counts and the service layer
//! adds process metrics and request counters.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ApprovalState;

// ─── Counts ──────────────────────────────────────────────────────────────────

/// Statement counts by approval state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementCounts {
  pub total:    i64,
  pub by_state: BTreeMap<ApprovalState, i64>,
}

impl StatementCounts {
  /// Count for one stored state; zero when never counted.
  pub fn get(&self, state: ApprovalState) -> i64 {
    self.by_state.get(&state).copied().unwrap_or(0)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActivity {
  pub user:       String,
  pub activities: i64,
}

/// Aggregates for one dataset, or for all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetStatus {
  pub statements:  StatementCounts,
  pub total_users: i64,
  pub top_users:   Vec<UserActivity>,
}

// ─── Process ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
  pub startup:        DateTime<Utc>,
  pub version:        String,
  pub cache_hits:     u64,
  pub cache_misses:   u64,
  /// Resident set size in bytes.
  pub rss:            u64,
  pub shared_memory:  u64,
  pub private_memory: u64,
}

/// Request counters per interactive operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStatus {
  pub get_entity:       u64,
  pub get_random:       u64,
  pub get_statement:    u64,
  pub update_statement: u64,
  pub get_status:       u64,
}

/// The report handed to callers of the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
  /// `None` for the all-datasets report.
  pub dataset:  Option<String>,
  #[serde(flatten)]
  pub counts:   DatasetStatus,
  pub system:   SystemStatus,
  pub requests: RequestStatus,
}

// ─── Activity log ────────────────────────────────────────────────────────────

/// Per-user approved and rejected counts for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
  /// End of the period.
  pub date:     NaiveDate,
  pub approved: BTreeMap<String, i64>,
  pub rejected: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLog {
  /// The most active users over the whole window.
  pub users:      BTreeSet<String>,
  /// One entry per period, newest first.
  pub activities: Vec<ActivityEntry>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_state_counts_as_zero() {
    let mut counts = StatementCounts::default();
    counts.by_state.insert(ApprovalState::Approved, 3);
    assert_eq!(counts.get(ApprovalState::Approved), 3);
    assert_eq!(counts.get(ApprovalState::Wrong), 0);
  }

  #[test]
  fn status_flattens_counts() {
    let status = Status {
      dataset:  Some("freebase".into()),
      counts:   DatasetStatus { total_users: 2, ..Default::default() },
      system:   SystemStatus {
        startup:        Utc::now(),
        version:        "test".into(),
        cache_hits:     0,
        cache_misses:   0,
        rss:            0,
        shared_memory:  0,
        private_memory: 0,
      },
      requests: RequestStatus::default(),
    };
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["total_users"], 2);
    assert_eq!(json["dataset"], "freebase");
  }
}
