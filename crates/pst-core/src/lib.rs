//! Core types and trait definitions for the primary sources statement store.
//!
//! This crate is deliberately free of database and cache dependencies. All
//! other crates depend on it; it depends on nothing proprietary.

pub mod error;
pub mod retry;
pub mod state;
pub mod statement;
pub mod status;
pub mod store;
pub mod value;

pub use error::{Classify, Error, ErrorClass, Result};
pub use state::ApprovalState;
pub use statement::{LogEntry, NewStatement, Statement};
pub use value::{Literal, Location, Precision, PropertyValue, Quantity, Time, Value, ValueType};
pub use retry::RetryPolicy;
pub use status::{
  ActivityEntry, ActivityLog, DatasetStatus, RequestStatus, StatementCounts, Status, SystemStatus,
  UserActivity,
};
pub use store::{SortOrder, StatementQuery, StatementStore};
