//! Error type for `pst-store-sqlite`.

use pst_core::{Classify, ErrorClass};
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] pst_core::Error),

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("connection pool error: {0}")]
  Pool(#[from] r2d2::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored row does not decode into a domain value.
  #[error("corrupt row: {0}")]
  Corrupt(String),

  /// The batch lost its transaction; drop it and start a new one.
  #[error("batch has no open transaction")]
  BatchClosed,
}

impl Classify for Error {
  fn class(&self) -> ErrorClass {
    match self {
      Self::Core(e) => e.class(),
      Self::Pool(_) => ErrorClass::Transient,
      Self::Database(rusqlite::Error::SqliteFailure(e, _)) => match e.code {
        ErrorCode::DatabaseBusy
        | ErrorCode::DatabaseLocked
        | ErrorCode::CannotOpen
        | ErrorCode::SystemIoFailure => ErrorClass::Transient,
        _ => ErrorClass::Invariant,
      },
      Self::Database(_) | Self::DateParse(_) | Self::Corrupt(_) | Self::BatchClosed => {
        ErrorClass::Invariant
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
