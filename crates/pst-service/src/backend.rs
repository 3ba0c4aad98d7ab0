//! [`Backend`]: the cached, retried, instrumented front of a statement store.
//!
//! Every interactive call goes through here. Reads are served from the cache
//! where a cache entry exists for the query; writes invalidate the entries
//! they can stale and mark the status snapshot dirty.

use std::sync::Arc;

use chrono::Utc;
use pst_core::{
  ActivityLog, ApprovalState, NewStatement, RetryPolicy, Statement, StatementQuery,
  StatementStore, Status,
};
use pst_store_sqlite::{DedupReport, SqliteStore};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
  Error, Result,
  cache::{CacheKey, StatementCache},
  config::{ActivitySettings, ImportSettings, Settings},
  populate::{CacheRefresher, PopulateReport, populate_shared},
  status::{Metrics, Request, StatusAggregator},
};

pub struct Backend<S: StatementStore + 'static> {
  store:         Arc<S>,
  cache:         Arc<StatementCache>,
  metrics:       Arc<Metrics>,
  status:        StatusAggregator<S>,
  /// Present when enabled and a shared tier is configured.
  refresher:     Option<CacheRefresher>,
  retry:         RetryPolicy,
  activity:      ActivitySettings,
  import:        ImportSettings,
  populate_page: usize,
}

impl<S: StatementStore + 'static> Backend<S> {
  /// Wrap `store` and start the status aggregator, plus the shared-cache
  /// refresher when it is enabled.
  pub fn new(store: S, cache: StatementCache, settings: &Settings) -> Result<Self> {
    let store = Arc::new(store);
    let cache = Arc::new(cache);
    let metrics = Arc::new(Metrics::default());
    let status = StatusAggregator::start(
      store.clone(),
      cache.clone(),
      metrics.clone(),
      settings.retry,
      &settings.status,
    )?;
    let refresher = match (settings.cache_refresh.enabled, cache.has_shared()) {
      (true, true) => Some(CacheRefresher::start(
        store.clone(),
        cache.clone(),
        settings.retry,
        &settings.cache_refresh,
      )?),
      (true, false) => {
        info!("cache refresh enabled without a shared cache; not starting");
        None
      }
      (false, _) => None,
    };
    Ok(Self {
      store,
      cache,
      metrics,
      status,
      refresher,
      retry: settings.retry,
      activity: settings.activity.clone(),
      import: settings.import.clone(),
      populate_page: settings.cache_refresh.page_size,
    })
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn cache(&self) -> &Arc<StatementCache> { &self.cache }

  pub fn metrics(&self) -> &Arc<Metrics> { &self.metrics }

  fn retried<T>(&self, op: impl FnMut() -> Result<T, S::Error>) -> Result<T> {
    self.retry.run(op).map_err(Error::store)
  }

  // ── Reads ───────────────────────────────────────────────────────────────

  pub fn get_statement(&self, id: i64) -> Result<Statement> {
    self.metrics.record(Request::GetStatement);
    self.retried(|| self.store.get_statement(id))
  }

  /// All statements about `qid` in `state`, optionally within one dataset.
  pub fn get_statements_by_qid(
    &self,
    qid: &str,
    state: ApprovalState,
    dataset: Option<&str>,
  ) -> Result<Vec<Statement>> {
    self.metrics.record(Request::GetEntity);
    self.entity(qid, state, dataset)
  }

  /// The statements of a random subject that has some in `state`.
  pub fn get_statements_by_random_qid(
    &self,
    state: ApprovalState,
    dataset: Option<&str>,
  ) -> Result<Vec<Statement>> {
    self.metrics.record(Request::GetRandom);
    let qid = self.retried(|| self.store.get_random_qid(state, dataset))?;
    debug!(qid, "random subject");
    self.entity(&qid, state, dataset)
  }

  pub fn get_random_statements(
    &self,
    count: usize,
    state: ApprovalState,
  ) -> Result<Vec<Statement>> {
    self.metrics.record(Request::GetRandom);
    self.retried(|| self.store.get_random_statements(count, state))
  }

  pub fn get_all_statements(&self, query: &StatementQuery) -> Result<Vec<Statement>> {
    self.retried(|| self.store.get_all_statements(query))
  }

  pub fn get_datasets(&self) -> Result<Vec<String>> {
    self.cache.get_or_load(&CacheKey::datasets(), || self.retried(|| self.store.get_datasets()))
  }

  /// Per-period approval activity of the most active users.
  pub fn get_activity_log(&self) -> Result<ActivityLog> {
    let ActivitySettings { period_days, periods, top_users } = self.activity;
    self.cache.get_or_load(&CacheKey::activities(), || {
      self.retried(|| self.store.get_activity_log(period_days, periods, top_users))
    })
  }

  pub fn status(&self, dataset: Option<&str>) -> Result<Status> {
    self.metrics.record(Request::GetStatus);
    self.status.status(dataset)
  }

  fn entity(
    &self,
    qid: &str,
    state: ApprovalState,
    dataset: Option<&str>,
  ) -> Result<Vec<Statement>> {
    let key = CacheKey::entity(qid, dataset, state);
    self.cache.get_or_load(&key, || {
      self.retried(|| self.store.get_statements_by_qid(qid, state, dataset))
    })
  }

  // ── Writes ──────────────────────────────────────────────────────────────

  /// Move statement `id` to `state` on behalf of `user`.
  ///
  /// Every cached lookup of the statement's subject is evicted, in its
  /// dataset and across all datasets, along with the activity log.
  pub fn update_statement(&self, id: i64, state: ApprovalState, user: &str) -> Result<()> {
    self.metrics.record(Request::UpdateStatement);
    let before = self.retried(|| self.store.transition(id, state, user))?;
    self.invalidate_entity(&before.qid, &before.dataset);
    self.cache.evict(&CacheKey::activities());
    self.status.set_dirty();
    info!(
      id,
      qid = %before.qid,
      from = %before.approval_state,
      to = %state,
      user,
      "statement updated"
    );
    Ok(())
  }

  /// Delete every statement in `state` and drop all cached results.
  pub fn delete_statements(&self, state: ApprovalState) -> Result<usize> {
    let deleted = self.retried(|| self.store.delete_statements(state))?;
    self.cache.clear();
    self.status.set_dirty();
    Ok(deleted)
  }

  // ── Cache and status maintenance ────────────────────────────────────────

  /// Evict every cached lookup of `qid` in `dataset` and across datasets.
  pub fn invalidate_entity(&self, qid: &str, dataset: &str) {
    for key in CacheKey::entity_family(qid, dataset) {
      self.cache.evict(&key);
    }
  }

  pub fn clear_cache(&self) { self.cache.clear(); }

  pub fn populate_shared_cache(&self) -> Result<PopulateReport> {
    populate_shared(&*self.store, &self.cache, &self.retry, self.populate_page)
  }

  /// Recompute the status snapshot now instead of waiting for the thread.
  pub fn refresh_status(&self) -> Result<()> { self.status.refresh() }

  pub fn mark_status_dirty(&self) { self.status.set_dirty(); }

  /// Stop background work. Also happens on drop.
  pub fn shutdown(&self) {
    self.status.shutdown();
    if let Some(refresher) = &self.refresher {
      refresher.shutdown();
    }
  }

  /// Repopulate the shared cache on the background refresher, if running.
  pub fn refresh_shared_cache(&self) -> bool {
    self.refresher.as_ref().inspect(|r| r.refresh_now()).is_some()
  }
}

// ─── SQLite ──────────────────────────────────────────────────────────────────

/// Outcome of [`Backend::import_statements`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
  /// Upload id stamped on every imported statement.
  pub upload:   i64,
  pub imported: u64,
  pub first_id: Option<i64>,
  pub dedup:    Option<DedupReport>,
}

impl Backend<SqliteStore> {
  /// Open the configured database and cache tiers.
  pub fn open(settings: &Settings) -> Result<Self> {
    let store = SqliteStore::open(&settings.database.path, settings.database.pool_size)?;
    Self::new(store, StatementCache::from_settings(settings)?, settings)
  }

  /// Bulk-load `statements` into `dataset`.
  ///
  /// Snaks are never shared with existing rows. All statements get the same
  /// upload id, the import start time in epoch milliseconds. With `dedup`,
  /// the duplicate sweep runs over the new statements afterwards.
  pub fn import_statements<I>(
    &self,
    statements: I,
    dataset: &str,
    dedup: bool,
  ) -> Result<ImportReport>
  where
    I: IntoIterator<Item = NewStatement>,
  {
    let upload = Utc::now().timestamp_millis();
    let mut report = ImportReport { upload, ..ImportReport::default() };
    info!(dataset, upload, "import: start");

    let mut batch = self.store.batch()?;
    for mut statement in statements {
      statement.dataset = dataset.to_owned();
      statement.upload = upload;
      let id = batch.session()?.add_statement(&statement, false)?;
      report.first_id.get_or_insert(id);
      report.imported += 1;

      if self.import.batch_size > 0 && report.imported % self.import.batch_size as u64 == 0 {
        batch.commit()?;
        info!(imported = report.imported, "import: progress");
      }
    }
    batch.finish()?;
    info!(imported = report.imported, "import: statements written");

    if dedup && let Some(first) = report.first_id {
      report.dedup = Some(self.store.mark_duplicates(first - 1, self.import.dedup_progress)?);
    }

    self.cache.clear();
    self.status.set_dirty();
    info!(dataset, imported = report.imported, "import: done");
    Ok(report)
  }

  /// Run the duplicate sweep over statements with ids above `start_id`.
  pub fn mark_duplicates(&self, start_id: i64) -> Result<DedupReport> {
    let report = self.store.mark_duplicates(start_id, self.import.dedup_progress)?;
    if report.marked > 0 {
      self.cache.clear();
      self.status.set_dirty();
    }
    Ok(report)
  }
}
