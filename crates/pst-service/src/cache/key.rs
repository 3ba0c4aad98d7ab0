//! Cache key construction.

use std::fmt;

use pst_core::ApprovalState;

/// Dataset component of keys that span every dataset. Never a valid tag.
pub const ALL_DATASETS: &str = "*";

/// A key into either cache tier.
///
/// Entity lookups are keyed `"{qid}-{dataset}-{state}"`, with
/// [`ALL_DATASETS`] standing in when no dataset filter applies. The local and
/// shared tiers use the same key for the same query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
  pub fn entity(qid: &str, dataset: Option<&str>, state: ApprovalState) -> Self {
    Self(format!("{qid}-{}-{state}", dataset.unwrap_or(ALL_DATASETS)))
  }

  /// Every entity key that a state change on `qid` in `dataset` can stale:
  /// all states including `Any`, for the dataset and for [`ALL_DATASETS`].
  pub fn entity_family(qid: &str, dataset: &str) -> Vec<Self> {
    let mut keys = Vec::with_capacity(16);
    for ds in [Some(dataset), None] {
      for state in ApprovalState::stored().chain([ApprovalState::Any]) {
        keys.push(Self::entity(qid, ds, state));
      }
    }
    keys
  }

  pub fn datasets() -> Self { Self("DATASETS".to_owned()) }

  pub fn activities() -> Self { Self("ACTIVITIES".to_owned()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}
