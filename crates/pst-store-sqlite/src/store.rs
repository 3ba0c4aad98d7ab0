//! [`SqliteStore`]: the pooled SQLite implementation of [`StatementStore`].

use std::path::Path;

use pst_core::{
  ActivityLog, ApprovalState, NewStatement, Statement, StatementQuery, StatementStore,
  UserActivity,
};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::TransactionBehavior;
use tracing::{debug, info};

use crate::{
  Batch, DedupReport, Error, Result, dedup,
  schema::{CONNECTION_PRAGMAS, SCHEMA},
  session::Session,
};

pub type SqlitePool = Pool<SqliteConnectionManager>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A statement store backed by a pool of SQLite connections.
///
/// Cloning is cheap: the pool is reference-counted. Every trait method checks
/// out a connection, runs in its own transaction, and returns the connection
/// before it returns.
#[derive(Clone)]
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with up to `pool_size` connections.
  pub fn open(path: impl AsRef<Path>, pool_size: u32) -> Result<Self> {
    let path = path.as_ref();
    let manager = SqliteConnectionManager::file(path)
      .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
    let pool = Pool::builder().max_size(pool_size.max(1)).build(manager)?;
    info!(path = %path.display(), pool_size, "opened statement store");
    Self::init(pool)
  }

  /// Open an in-memory store, useful for testing.
  ///
  /// Every in-memory connection is its own database, so the pool holds one
  /// connection that never expires.
  pub fn open_in_memory() -> Result<Self> {
    let manager =
      SqliteConnectionManager::memory().with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
    let pool = Pool::builder()
      .max_size(1)
      .idle_timeout(None)
      .max_lifetime(None)
      .build(manager)?;
    Self::init(pool)
  }

  fn init(pool: SqlitePool) -> Result<Self> {
    pool.get()?.execute_batch(SCHEMA)?;
    Ok(Self { pool })
  }

  /// Start a managed batch on a dedicated connection.
  ///
  /// On an in-memory store the batch holds the only connection, so no other
  /// call can proceed until the batch is finished or dropped.
  pub fn batch(&self) -> Result<Batch> { Batch::begin(self.pool.get()?) }

  /// Run the duplicate sweep from `start_id` in a batch of its own.
  pub fn mark_duplicates(&self, start_id: i64, progress_every: u64) -> Result<DedupReport> {
    let mut batch = self.batch()?;
    let report = dedup::mark_duplicates(&mut batch, start_id, progress_every)?;
    batch.finish()?;
    Ok(report)
  }

  /// Run `f` in a deferred (read) transaction.
  pub(crate) fn read<T>(&self, f: impl FnOnce(&Session<'_>) -> Result<T>) -> Result<T> {
    let mut conn = self.pool.get()?;
    let tx = conn.transaction()?;
    let out = f(&Session::new(&tx))?;
    tx.commit()?;
    Ok(out)
  }

  /// Run `f` in an immediate (write) transaction. Dropping the transaction
  /// on error rolls it back.
  pub(crate) fn write<T>(&self, f: impl FnOnce(&Session<'_>) -> Result<T>) -> Result<T> {
    let mut conn = self.pool.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let out = f(&Session::new(&tx))?;
    tx.commit()?;
    Ok(out)
  }
}

// ─── StatementStore impl ─────────────────────────────────────────────────────

impl StatementStore for SqliteStore {
  type Error = Error;

  fn add_statement(&self, statement: &NewStatement, check_duplicates: bool) -> Result<i64> {
    self.write(|s| s.add_statement(statement, check_duplicates))
  }

  fn update_statement(&self, id: i64, state: ApprovalState) -> Result<()> {
    self.write(|s| s.update_statement(id, state))
  }

  fn add_userlog(&self, user: &str, id: i64, state: ApprovalState) -> Result<()> {
    self.write(|s| s.add_userlog(user, id, state))
  }

  fn transition(&self, id: i64, state: ApprovalState, user: &str) -> Result<Statement> {
    let before = self.write(|s| s.transition(id, state, user))?;
    debug!(id, from = %before.approval_state, to = %state, user, "statement transitioned");
    Ok(before)
  }

  fn delete_statements(&self, state: ApprovalState) -> Result<usize> {
    let deleted = self.write(|s| s.delete_statements(state))?;
    info!(%state, deleted, "deleted statements");
    Ok(deleted)
  }

  fn get_statement(&self, id: i64) -> Result<Statement> { self.read(|s| s.get_statement(id)) }

  fn get_statements_by_qid(
    &self,
    qid: &str,
    state: ApprovalState,
    dataset: Option<&str>,
  ) -> Result<Vec<Statement>> {
    self.read(|s| s.get_statements_by_qid(qid, state, dataset))
  }

  fn get_random_statements(&self, count: usize, state: ApprovalState) -> Result<Vec<Statement>> {
    self.read(|s| s.get_random_statements(count, state))
  }

  fn get_random_qid(&self, state: ApprovalState, dataset: Option<&str>) -> Result<String> {
    self.read(|s| s.get_random_qid(state, dataset))
  }

  fn get_all_statements(&self, query: &StatementQuery) -> Result<Vec<Statement>> {
    self.read(|s| s.get_all_statements(query))
  }

  fn get_datasets(&self) -> Result<Vec<String>> { self.read(|s| s.get_datasets()) }

  fn unapproved_subjects_after(&self, start_id: i64) -> Result<Vec<String>> {
    self.read(|s| s.unapproved_subjects_after(start_id))
  }

  fn count_statements(&self, dataset: Option<&str>) -> Result<i64> {
    self.read(|s| s.count_statements(dataset))
  }

  fn count_statements_by_state(&self, state: ApprovalState, dataset: Option<&str>) -> Result<i64> {
    self.read(|s| s.count_statements_by_state(state, dataset))
  }

  fn count_users(&self, dataset: Option<&str>) -> Result<i64> {
    self.read(|s| s.count_users(dataset))
  }

  fn get_top_users(&self, dataset: Option<&str>, limit: usize) -> Result<Vec<UserActivity>> {
    self.read(|s| s.get_top_users(dataset, limit))
  }

  fn get_activity_log(&self, period_days: u32, periods: u32, top_n: usize) -> Result<ActivityLog> {
    self.read(|s| s.get_activity_log(period_days, periods, top_n))
  }
}
