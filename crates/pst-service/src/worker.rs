//! Background threads woken by a dirty flag or a timeout.

use std::{
  sync::Arc,
  thread::{self, JoinHandle},
  time::Duration,
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::Result;

/// When a worker runs its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
  /// Only after [`Worker::set_dirty`]. A timeout just re-checks the flag.
  WhenDirty,
  /// After [`Worker::set_dirty`] and whenever the interval elapses.
  Periodic,
}

struct Signal {
  dirty:    bool,
  shutdown: bool,
}

struct Control {
  signal: Mutex<Signal>,
  wake:   Condvar,
}

/// A named thread running one job in a loop.
///
/// The dirty flag starts set, so the job runs once at startup. A failed run
/// (the job returns `false`) leaves the flag set and waits a full interval
/// before trying again.
pub struct Worker {
  name:    String,
  control: Arc<Control>,
  handle:  Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
  pub fn spawn<F>(name: &str, interval: Duration, schedule: Schedule, job: F) -> Result<Self>
  where
    F: FnMut() -> bool + Send + 'static,
  {
    let control = Arc::new(Control {
      signal: Mutex::new(Signal { dirty: true, shutdown: false }),
      wake:   Condvar::new(),
    });
    let thread_control = control.clone();
    let handle = thread::Builder::new()
      .name(name.to_owned())
      .spawn(move || run(&thread_control, interval, schedule, job))?;
    debug!(worker = name, "worker started");
    Ok(Self { name: name.to_owned(), control, handle: Mutex::new(Some(handle)) })
  }

  /// Request a run and wake the thread.
  pub fn set_dirty(&self) {
    self.control.signal.lock().dirty = true;
    self.control.wake.notify_one();
  }

  /// Stop the thread and wait for it. A job in progress finishes first.
  /// Calling this more than once is harmless.
  pub fn shutdown(&self) {
    self.control.signal.lock().shutdown = true;
    self.control.wake.notify_one();
    if let Some(handle) = self.handle.lock().take() {
      if handle.join().is_err() {
        warn!(worker = %self.name, "worker panicked");
      }
      debug!(worker = %self.name, "worker stopped");
    }
  }
}

impl Drop for Worker {
  fn drop(&mut self) { self.shutdown(); }
}

fn run(control: &Control, interval: Duration, schedule: Schedule, mut job: impl FnMut() -> bool) {
  let mut failed = false;
  loop {
    {
      let mut signal = control.signal.lock();
      if signal.shutdown {
        return;
      }
      if !signal.dirty || failed {
        let timeout = control.wake.wait_for(&mut signal, interval);
        if signal.shutdown {
          return;
        }
        if timeout.timed_out() && schedule == Schedule::Periodic {
          signal.dirty = true;
        }
        if !signal.dirty {
          failed = false;
          continue;
        }
      }
      signal.dirty = false;
    }

    failed = !job();
    if failed {
      control.signal.lock().dirty = true;
    }
  }
}
