//! Error types for `pst-core`.

use thiserror::Error;

/// Coarse classification of an error, shared by every layer.
///
/// Only [`ErrorClass::Transient`] errors are ever retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
  /// A statement, snak, or random entity does not exist.
  NotFound,
  /// The caller supplied something unparseable or unsupported.
  InvalidInput,
  /// Connectivity or contention; the same call may succeed later.
  Transient,
  /// Stored data or internal state broke an assumption.
  Invariant,
}

/// Implemented by every error type that crosses a store boundary.
pub trait Classify {
  fn class(&self) -> ErrorClass;

  fn is_transient(&self) -> bool { self.class() == ErrorClass::Transient }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("statement not found: {0}")]
  StatementNotFound(i64),

  #[error("snak not found: {0}")]
  SnakNotFound(i64),

  #[error("no entity found")]
  NoEntityFound,

  #[error("invalid approval state: {0:?}")]
  InvalidState(String),

  #[error("invalid value: {0}")]
  InvalidValue(String),

  #[error("unknown value type: {0:?}")]
  UnknownValueType(String),
}

impl Classify for Error {
  fn class(&self) -> ErrorClass {
    match self {
      Self::StatementNotFound(_) | Self::SnakNotFound(_) | Self::NoEntityFound => {
        ErrorClass::NotFound
      }
      Self::InvalidState(_) | Self::InvalidValue(_) => ErrorClass::InvalidInput,
      Self::UnknownValueType(_) => ErrorClass::Invariant,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
