//! Bulk population of the shared cache tier.
//!
//! Walks every unapproved statement, grouped by subject, and writes one
//! shared entry per subject: first for the all-datasets scope, then for each
//! dataset. Entries land under the same keys entity lookups use, so a fresh
//! process starts warm.

use std::{iter, sync::Arc, time::Instant};

use pst_core::{ApprovalState, RetryPolicy, SortOrder, Statement, StatementQuery, StatementStore};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  cache::{ALL_DATASETS, CacheKey, StatementCache},
  config::CacheRefreshSettings,
  worker::{Schedule, Worker},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PopulateReport {
  /// Scopes walked: the all-datasets scope plus one per dataset.
  pub scopes:     usize,
  /// Shared entries written.
  pub subjects:   u64,
  pub statements: u64,
}

/// Populate the shared tier from the store. Does nothing without one.
pub fn populate_shared<S: StatementStore>(
  store: &S,
  cache: &StatementCache,
  retry: &RetryPolicy,
  page_size: usize,
) -> Result<PopulateReport> {
  let mut report = PopulateReport::default();
  if !cache.has_shared() {
    info!("no shared cache configured, skipping population");
    return Ok(report);
  }

  let started = Instant::now();
  let datasets = retry.run(|| store.get_datasets()).map_err(Error::store)?;
  let scopes = iter::once(None).chain(datasets.iter().map(|ds| Some(ds.as_str())));
  for dataset in scopes {
    populate_scope(store, cache, retry, dataset, page_size.max(1), &mut report)?;
    report.scopes += 1;
  }

  info!(
    scopes = report.scopes,
    subjects = report.subjects,
    statements = report.statements,
    elapsed_ms = started.elapsed().as_millis() as u64,
    "shared cache populated"
  );
  Ok(report)
}

fn populate_scope<S: StatementStore>(
  store: &S,
  cache: &StatementCache,
  retry: &RetryPolicy,
  dataset: Option<&str>,
  page_size: usize,
  report: &mut PopulateReport,
) -> Result<()> {
  let mut query = StatementQuery {
    limit: page_size,
    state: ApprovalState::Unapproved,
    dataset: dataset.map(str::to_owned),
    order: SortOrder::BySubject,
    ..StatementQuery::default()
  };
  // A subject's statements may straddle a page boundary.
  let mut pending: Vec<Statement> = Vec::new();

  loop {
    let page = retry.run(|| store.get_all_statements(&query)).map_err(Error::store)?;
    let last_page = page.len() < page_size;
    query.offset += page.len();

    for statement in page {
      if pending.first().is_some_and(|p| p.qid != statement.qid) {
        flush(cache, dataset, &mut pending, report)?;
      }
      pending.push(statement);
    }
    if last_page {
      break;
    }
  }
  flush(cache, dataset, &mut pending, report)?;

  debug!(dataset = dataset.unwrap_or(ALL_DATASETS), "scope populated");
  Ok(())
}

fn flush(
  cache: &StatementCache,
  dataset: Option<&str>,
  pending: &mut Vec<Statement>,
  report: &mut PopulateReport,
) -> Result<()> {
  let Some(first) = pending.first() else { return Ok(()) };
  let key = CacheKey::entity(&first.qid, dataset, ApprovalState::Unapproved);
  cache.put_shared(&key, &*pending)?;
  report.subjects += 1;
  report.statements += pending.len() as u64;
  pending.clear();
  Ok(())
}

// ─── Background refresher ────────────────────────────────────────────────────

/// Re-populates the shared tier on a fixed interval.
pub struct CacheRefresher {
  worker: Worker,
}

impl CacheRefresher {
  /// Start the refresher thread. The first population runs right away.
  pub fn start<S: StatementStore + 'static>(
    store: Arc<S>,
    cache: Arc<StatementCache>,
    retry: RetryPolicy,
    settings: &CacheRefreshSettings,
  ) -> Result<Self> {
    let page_size = settings.page_size;
    let job = move || match populate_shared(&*store, &cache, &retry, page_size) {
      Ok(_) => true,
      Err(e) => {
        warn!("shared cache population failed: {e}");
        false
      }
    };
    let worker = Worker::spawn("pst-cache-refresh", settings.interval(), Schedule::Periodic, job)?;
    Ok(Self { worker })
  }

  /// Run a population as soon as the thread is free.
  pub fn refresh_now(&self) { self.worker.set_dirty(); }

  pub fn shutdown(&self) { self.worker.shutdown(); }
}
