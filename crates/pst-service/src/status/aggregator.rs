//! Background recomputation of statement and user aggregates.
//!
//! Counting is expensive on a large store, so the aggregator keeps a snapshot
//! and recomputes it on its own thread whenever the data is marked dirty.
//! Readers only take the snapshot lock; the refresh lock serialises
//! recomputations against each other.

use std::{collections::BTreeMap, sync::Arc, time::Instant};

use parking_lot::Mutex;
use pst_core::{
  ApprovalState, DatasetStatus, RetryPolicy, StatementCounts, StatementStore, Status,
};
use tracing::{info, warn};

use crate::{
  Error, Result,
  cache::StatementCache,
  config::StatusSettings,
  status::Metrics,
  worker::{Schedule, Worker},
};

#[derive(Default)]
struct Snapshot {
  global:   Option<DatasetStatus>,
  datasets: BTreeMap<String, DatasetStatus>,
}

struct Inner<S> {
  store:     Arc<S>,
  cache:     Arc<StatementCache>,
  metrics:   Arc<Metrics>,
  retry:     RetryPolicy,
  top_users: usize,
  snapshot:  Mutex<Snapshot>,
  refresh:   Mutex<()>,
}

pub struct StatusAggregator<S> {
  inner:  Arc<Inner<S>>,
  worker: Worker,
}

impl<S: StatementStore + 'static> StatusAggregator<S> {
  /// Start the refresh thread. The first snapshot is computed right away.
  pub fn start(
    store: Arc<S>,
    cache: Arc<StatementCache>,
    metrics: Arc<Metrics>,
    retry: RetryPolicy,
    settings: &StatusSettings,
  ) -> Result<Self> {
    let inner = Arc::new(Inner {
      store,
      cache,
      metrics,
      retry,
      top_users: settings.top_users,
      snapshot: Mutex::new(Snapshot::default()),
      refresh: Mutex::new(()),
    });

    let job_inner = inner.clone();
    let worker = Worker::spawn(
      "pst-status",
      settings.refresh_interval(),
      Schedule::WhenDirty,
      move || match job_inner.refresh_all() {
        Ok(()) => true,
        Err(e) => {
          warn!("status refresh failed: {e}");
          false
        }
      },
    )?;

    Ok(Self { inner, worker })
  }

  /// Mark the snapshot stale and wake the refresh thread.
  pub fn set_dirty(&self) { self.worker.set_dirty(); }

  /// Recompute the whole snapshot on the calling thread.
  pub fn refresh(&self) -> Result<()> { self.inner.refresh_all() }

  /// The current report for one dataset, or for all of them with `None`.
  ///
  /// A dataset missing from the snapshot is computed synchronously first.
  pub fn status(&self, dataset: Option<&str>) -> Result<Status> {
    let cached = {
      let snapshot = self.inner.snapshot.lock();
      match dataset {
        None => snapshot.global.clone(),
        Some(ds) => snapshot.datasets.get(ds).cloned(),
      }
    };
    let counts = match (cached, dataset) {
      (Some(counts), _) => counts,
      (None, Some(ds)) => self.inner.refresh_dataset(ds)?,
      (None, None) => self.inner.refresh_global()?,
    };

    Ok(Status {
      dataset: dataset.map(str::to_owned),
      counts,
      system: self.inner.metrics.system(&self.inner.cache),
      requests: self.inner.metrics.requests(),
    })
  }

  /// Stop the refresh thread. Later calls to [`Self::status`] still work but
  /// only refresh synchronously.
  pub fn shutdown(&self) { self.worker.shutdown(); }
}

impl<S: StatementStore> Inner<S> {
  fn refresh_all(&self) -> Result<()> {
    let _guard = self.refresh.lock();
    let started = Instant::now();
    let (global, datasets) = self
      .retry
      .run(|| {
        let global = compute(&*self.store, None, self.top_users)?;
        let mut datasets = BTreeMap::new();
        for ds in self.store.get_datasets()? {
          let status = compute(&*self.store, Some(&ds), self.top_users)?;
          datasets.insert(ds, status);
        }
        Ok::<_, S::Error>((global, datasets))
      })
      .map_err(Error::store)?;

    let count = datasets.len();
    *self.snapshot.lock() = Snapshot { global: Some(global), datasets };
    info!(
      datasets = count,
      elapsed_ms = started.elapsed().as_millis() as u64,
      "status refreshed"
    );
    Ok(())
  }

  fn refresh_global(&self) -> Result<DatasetStatus> {
    self.refresh_all()?;
    Ok(self.snapshot.lock().global.clone().unwrap_or_default())
  }

  fn refresh_dataset(&self, dataset: &str) -> Result<DatasetStatus> {
    let _guard = self.refresh.lock();
    let status = self
      .retry
      .run(|| compute(&*self.store, Some(dataset), self.top_users))
      .map_err(Error::store)?;
    self.snapshot.lock().datasets.insert(dataset.to_owned(), status.clone());
    Ok(status)
  }
}

fn compute<S: StatementStore>(
  store: &S,
  dataset: Option<&str>,
  top_users: usize,
) -> Result<DatasetStatus, S::Error> {
  let mut statements =
    StatementCounts { total: store.count_statements(dataset)?, ..Default::default() };
  for state in ApprovalState::stored() {
    statements.by_state.insert(state, store.count_statements_by_state(state, dataset)?);
  }
  Ok(DatasetStatus {
    statements,
    total_users: store.count_users(dataset)?,
    top_users: store.get_top_users(dataset, top_users)?,
  })
}
