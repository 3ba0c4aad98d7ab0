//! Approval workflow states.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{Error, Result};

/// The workflow status of a statement.
///
/// [`ApprovalState::Any`] only ever appears in queries, where it means "no
/// state filter". It has no storage code and is never persisted.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApprovalState {
  #[default]
  Unapproved,
  Approved,
  OtherSource,
  Wrong,
  Skipped,
  Duplicate,
  Blacklisted,
  Any,
}

impl ApprovalState {
  /// Parse the lowercase string form (`"approved"`, `"othersource"`, ...).
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::InvalidState(s.to_owned()))
  }

  pub fn as_str(self) -> &'static str { self.into() }

  /// The integer stored in the `state` columns, or `None` for `Any`.
  pub fn code(self) -> Option<i64> {
    match self {
      Self::Unapproved => Some(0),
      Self::Approved => Some(1),
      Self::OtherSource => Some(2),
      Self::Wrong => Some(3),
      Self::Skipped => Some(4),
      Self::Duplicate => Some(5),
      Self::Blacklisted => Some(6),
      Self::Any => None,
    }
  }

  pub fn from_code(code: i64) -> Result<Self> {
    match code {
      0 => Ok(Self::Unapproved),
      1 => Ok(Self::Approved),
      2 => Ok(Self::OtherSource),
      3 => Ok(Self::Wrong),
      4 => Ok(Self::Skipped),
      5 => Ok(Self::Duplicate),
      6 => Ok(Self::Blacklisted),
      other => Err(Error::InvalidState(format!("state code {other}"))),
    }
  }

  /// Every state a statement can actually hold, i.e. all but `Any`.
  pub fn stored() -> impl Iterator<Item = Self> {
    Self::iter().filter(|s| *s != Self::Any)
  }

  /// Transitions into system-driven states are not user effort and get no
  /// user-log entry.
  pub fn is_user_tracked(self) -> bool {
    !matches!(self, Self::Duplicate | Self::Blacklisted | Self::Any)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn string_forms_roundtrip() {
    for state in ApprovalState::iter() {
      assert_eq!(ApprovalState::parse(state.as_str()).unwrap(), state);
    }
    assert_eq!(ApprovalState::OtherSource.to_string(), "othersource");
  }

  #[test]
  fn unknown_string_is_rejected() {
    let err = ApprovalState::parse("maybe").unwrap_err();
    assert!(matches!(err, Error::InvalidState(s) if s == "maybe"));
  }

  #[test]
  fn codes_cover_stored_states_only() {
    for state in ApprovalState::stored() {
      let code = state.code().unwrap();
      assert_eq!(ApprovalState::from_code(code).unwrap(), state);
    }
    assert_eq!(ApprovalState::Any.code(), None);
    assert!(ApprovalState::from_code(7).is_err());
    assert_eq!(ApprovalState::stored().count(), 7);
  }

  #[test]
  fn system_states_are_not_user_tracked() {
    assert!(ApprovalState::Approved.is_user_tracked());
    assert!(ApprovalState::Wrong.is_user_tracked());
    assert!(!ApprovalState::Duplicate.is_user_tracked());
    assert!(!ApprovalState::Blacklisted.is_user_tracked());
  }

  #[test]
  fn serde_uses_lowercase() {
    let json = serde_json::to_string(&ApprovalState::OtherSource).unwrap();
    assert_eq!(json, "\"othersource\"");
  }
}
