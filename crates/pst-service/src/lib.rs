//! Service layer over a statement store.
//!
//! [`Backend`] wraps a [`pst_core::StatementStore`] with a two-tier cache
//! ([`cache`]), retry on transient failures, request metrics, and a
//! background status aggregator ([`status`]). Configuration is in [`config`].

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod populate;
pub mod status;
mod worker;

pub use backend::{Backend, ImportReport};
pub use cache::{CacheKey, RedisCache, SharedCache, StatementCache};
pub use config::Settings;
pub use error::{Error, Result};
pub use populate::{CacheRefresher, PopulateReport, populate_shared};
pub use status::{Metrics, StatusAggregator};
