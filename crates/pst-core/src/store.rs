//! The `StatementStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `pst-store-sqlite`).
//! The service layer depends on this abstraction, not on any concrete
//! backend. All calls block; implementations must be safe to share between
//! request threads and the background status thread.

use crate::{
  ApprovalState, Classify, NewStatement, Statement, Value,
  status::{ActivityLog, UserActivity},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Result ordering for [`StatementStore::get_all_statements`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
  #[default]
  ById,
  /// Subject first, then id. Keeps all statements of one entity adjacent.
  BySubject,
}

/// Parameters for [`StatementStore::get_all_statements`].
#[derive(Debug, Clone)]
pub struct StatementQuery {
  pub offset:   usize,
  pub limit:    usize,
  /// `ApprovalState::Any` disables the state filter.
  pub state:    ApprovalState,
  /// `None` matches every dataset.
  pub dataset:  Option<String>,
  /// Restrict to statements whose main snak has this property.
  pub property: Option<String>,
  /// Restrict to statements whose main snak has exactly this value.
  pub value:    Option<Value>,
  pub order:    SortOrder,
}

impl Default for StatementQuery {
  fn default() -> Self {
    Self {
      offset:   0,
      limit:    10,
      state:    ApprovalState::Any,
      dataset:  None,
      property: None,
      value:    None,
      order:    SortOrder::ById,
    }
  }
}

impl StatementQuery {
  pub fn page(offset: usize, limit: usize) -> Self {
    Self { offset, limit, ..Self::default() }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a statement store backend.
///
/// Unless stated otherwise, a `dataset` of `None` means "all datasets" and a
/// `state` of [`ApprovalState::Any`] means "every state".
pub trait StatementStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist a statement and return its new id.
  ///
  /// With `check_duplicates`, each snak is looked up by exact content and
  /// reused when found; otherwise fresh snak rows are always inserted.
  fn add_statement(
    &self,
    statement: &NewStatement,
    check_duplicates: bool,
  ) -> Result<i64, Self::Error>;

  /// Set the approval state without touching the user log.
  fn update_statement(
    &self,
    id: i64,
    state: ApprovalState,
  ) -> Result<(), Self::Error>;

  /// Append a user-log entry stamped with the current time.
  fn add_userlog(
    &self,
    user: &str,
    id: i64,
    state: ApprovalState,
  ) -> Result<(), Self::Error>;

  /// Move a statement to `state` on behalf of `user`, atomically.
  ///
  /// Returns the statement as it was before the change. No log entry is
  /// written for the `Duplicate` and `Blacklisted` targets.
  fn transition(
    &self,
    id: i64,
    state: ApprovalState,
    user: &str,
  ) -> Result<Statement, Self::Error>;

  /// Physically delete every statement in `state`; returns how many went.
  fn delete_statements(&self, state: ApprovalState) -> Result<usize, Self::Error>;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn get_statement(&self, id: i64) -> Result<Statement, Self::Error>;

  /// All statements of one subject, ordered by id.
  fn get_statements_by_qid(
    &self,
    qid: &str,
    state: ApprovalState,
    dataset: Option<&str>,
  ) -> Result<Vec<Statement>, Self::Error>;

  /// Up to `count` statements starting at a random point in id order.
  fn get_random_statements(
    &self,
    count: usize,
    state: ApprovalState,
  ) -> Result<Vec<Statement>, Self::Error>;

  /// A random subject with at least one statement matching the filters.
  fn get_random_qid(
    &self,
    state: ApprovalState,
    dataset: Option<&str>,
  ) -> Result<String, Self::Error>;

  fn get_all_statements(
    &self,
    query: &StatementQuery,
  ) -> Result<Vec<Statement>, Self::Error>;

  /// Distinct dataset tags, sorted.
  fn get_datasets(&self) -> Result<Vec<String>, Self::Error>;

  /// Distinct subjects with an `Unapproved` statement whose id exceeds
  /// `start_id`.
  fn unapproved_subjects_after(
    &self,
    start_id: i64,
  ) -> Result<Vec<String>, Self::Error>;

  // ── Aggregates ────────────────────────────────────────────────────────

  fn count_statements(&self, dataset: Option<&str>) -> Result<i64, Self::Error>;

  fn count_statements_by_state(
    &self,
    state: ApprovalState,
    dataset: Option<&str>,
  ) -> Result<i64, Self::Error>;

  /// Distinct users who have acted on statements in the dataset.
  fn count_users(&self, dataset: Option<&str>) -> Result<i64, Self::Error>;

  /// Users ranked by activity count, excluding `Duplicate` and `Blacklisted`
  /// log entries.
  fn get_top_users(
    &self,
    dataset: Option<&str>,
    limit: usize,
  ) -> Result<Vec<UserActivity>, Self::Error>;

  /// Approved and rejected counts of the most active users over
  /// `periods` windows of `period_days` each, newest first.
  fn get_activity_log(
    &self,
    period_days: u32,
    periods: u32,
    top_n: usize,
  ) -> Result<ActivityLog, Self::Error>;
}
