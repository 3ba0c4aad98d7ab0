//! Retry with exponential backoff for transient store failures.

use std::{fmt::Display, thread, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Classify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Retries after the first attempt; `3` means at most four calls.
  pub max_retries:     u32,
  /// Delay before the first retry. Doubles on every further retry.
  #[serde(with = "millis")]
  pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_retries: 3, initial_backoff: Duration::from_millis(1000) }
  }
}

impl RetryPolicy {
  /// A policy that never sleeps, for tests and batch jobs.
  pub fn immediate(max_retries: u32) -> Self {
    Self { max_retries, initial_backoff: Duration::ZERO }
  }

  /// Run `op` until it succeeds, fails with a non-transient error, or the
  /// retry budget is spent. The last error is returned unchanged.
  pub fn run<T, E, F>(&self, mut op: F) -> Result<T, E>
  where
    E: Classify + Display,
    F: FnMut() -> Result<T, E>,
  {
    let mut backoff = self.initial_backoff;
    let mut attempt = 0;
    loop {
      match op() {
        Ok(value) => return Ok(value),
        Err(e) if e.is_transient() && attempt < self.max_retries => {
          attempt += 1;
          warn!(
            attempt,
            max = self.max_retries,
            backoff_ms = backoff.as_millis() as u64,
            "transient failure, retrying: {e}"
          );
          if !backoff.is_zero() {
            thread::sleep(backoff);
          }
          backoff = backoff.saturating_mul(2);
        }
        Err(e) => return Err(e),
      }
    }
  }
}

mod millis {
  use std::time::Duration;

  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    u64::deserialize(d).map(Duration::from_millis)
  }
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;

  use super::*;
  use crate::{Error, ErrorClass};

  #[derive(Debug)]
  struct Flaky;

  impl Display for Flaky {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.write_str("database is locked")
    }
  }

  impl Classify for Flaky {
    fn class(&self) -> ErrorClass { ErrorClass::Transient }
  }

  #[test]
  fn transient_errors_exhaust_the_budget() {
    let calls = Cell::new(0);
    let result: Result<(), Flaky> = RetryPolicy::immediate(3).run(|| {
      calls.set(calls.get() + 1);
      Err(Flaky)
    });
    assert!(result.is_err());
    assert_eq!(calls.get(), 4);
  }

  #[test]
  fn recovers_after_transient_failures() {
    let calls = Cell::new(0);
    let result = RetryPolicy::immediate(3).run(|| {
      calls.set(calls.get() + 1);
      if calls.get() < 3 { Err(Flaky) } else { Ok(calls.get()) }
    });
    assert_eq!(result.unwrap(), 3);
  }

  #[test]
  fn not_found_is_not_retried() {
    let calls = Cell::new(0);
    let result: Result<(), Error> = RetryPolicy::immediate(3).run(|| {
      calls.set(calls.get() + 1);
      Err(Error::StatementNotFound(9))
    });
    assert!(matches!(result, Err(Error::StatementNotFound(9))));
    assert_eq!(calls.get(), 1);
  }

  #[test]
  fn policy_reads_backoff_in_millis() {
    let policy: RetryPolicy =
      serde_json::from_str(r#"{"max_retries":2,"initial_backoff":250}"#).unwrap();
    assert_eq!(policy.initial_backoff, Duration::from_millis(250));
  }
}
