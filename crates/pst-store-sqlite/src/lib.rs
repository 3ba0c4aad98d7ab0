//! SQLite backend for the primary sources statement store.
//!
//! Connections come from an [`r2d2`] pool and are held for one logical
//! operation only. Bulk work (imports, the duplicate sweep) runs through a
//! [`Batch`], which keeps one connection and leaves commit points to the
//! caller.

mod encode;
mod schema;
mod session;
mod store;

pub mod batch;
pub mod dedup;
pub mod error;

pub use batch::Batch;
pub use dedup::{DedupReport, mark_duplicates};
pub use error::{Error, Result};
pub use session::Session;
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
