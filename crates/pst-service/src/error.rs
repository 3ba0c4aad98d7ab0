//! Error type for `pst-service`.

use pst_core::{Classify, ErrorClass};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Any store failure, with its class captured before type erasure.
  #[error("store error: {source}")]
  Store {
    class:  ErrorClass,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("config error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("shared cache error: {0}")]
  Cache(#[from] crate::cache::CacheError),

  #[error("cannot start worker thread: {0}")]
  Spawn(#[from] std::io::Error),
}

impl Error {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Classify + Send + Sync + 'static,
  {
    Self::Store { class: e.class(), source: Box::new(e) }
  }
}

impl Classify for Error {
  fn class(&self) -> ErrorClass {
    match self {
      Self::Store { class, .. } => *class,
      Self::Config(_) => ErrorClass::InvalidInput,
      Self::Cache(_) => ErrorClass::Transient,
      Self::Spawn(_) => ErrorClass::Invariant,
    }
  }
}

impl From<pst_store_sqlite::Error> for Error {
  fn from(e: pst_store_sqlite::Error) -> Self { Self::store(e) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
