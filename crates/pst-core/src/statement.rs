//! Statements and their user activity log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ApprovalState, PropertyValue, Value};

// ─── Activity log ────────────────────────────────────────────────────────────

/// One user action on a statement. Append-only; only ever read back from
/// storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
  pub user:    String,
  pub state:   ApprovalState,
  pub changed: DateTime<Utc>,
}

// ─── Statement ───────────────────────────────────────────────────────────────

/// A persisted candidate fact about a subject.
///
/// Only `approval_state` ever changes after creation; `id` and `activities`
/// are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
  pub id:             i64,
  pub qid:            String,
  pub property_value: PropertyValue,
  pub qualifiers:     Vec<PropertyValue>,
  pub sources:        Vec<PropertyValue>,
  pub dataset:        String,
  pub upload:         i64,
  pub approval_state: ApprovalState,
  #[serde(default)]
  pub activities:     Vec<LogEntry>,
}

impl Statement {
  /// Content equality used by the duplicate sweep.
  ///
  /// Compares subject, main snak, and the qualifier and source multisets.
  /// Ignores id, dataset, upload, state, and activities.
  pub fn content_eq(&self, other: &Statement) -> bool {
    same_content(self.content(), other.content())
  }

  fn content(&self) -> Content<'_> {
    (&self.qid, &self.property_value, &self.qualifiers, &self.sources)
  }
}

/// Input form of a statement, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStatement {
  pub qid:            String,
  pub property_value: PropertyValue,
  #[serde(default)]
  pub qualifiers:     Vec<PropertyValue>,
  #[serde(default)]
  pub sources:        Vec<PropertyValue>,
  #[serde(default)]
  pub dataset:        String,
  #[serde(default)]
  pub upload:         i64,
  #[serde(default)]
  pub approval_state: ApprovalState,
}

impl NewStatement {
  pub fn new(qid: impl Into<String>, property: impl Into<String>, value: Value) -> Self {
    Self {
      qid:            qid.into(),
      property_value: PropertyValue::new(property, value),
      qualifiers:     Vec::new(),
      sources:        Vec::new(),
      dataset:        String::new(),
      upload:         0,
      approval_state: ApprovalState::Unapproved,
    }
  }

  pub fn with_qualifier(mut self, property: impl Into<String>, value: Value) -> Self {
    self.qualifiers.push(PropertyValue::new(property, value));
    self
  }

  pub fn with_source(mut self, property: impl Into<String>, value: Value) -> Self {
    self.sources.push(PropertyValue::new(property, value));
    self
  }

  pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
    self.dataset = dataset.into();
    self
  }

  pub fn with_upload(mut self, upload: i64) -> Self {
    self.upload = upload;
    self
  }

  pub fn with_state(mut self, state: ApprovalState) -> Self {
    self.approval_state = state;
    self
  }

  pub fn same_content_as(&self, stored: &Statement) -> bool {
    same_content(
      (&self.qid, &self.property_value, &self.qualifiers, &self.sources),
      stored.content(),
    )
  }
}

type Content<'a> =
  (&'a str, &'a PropertyValue, &'a [PropertyValue], &'a [PropertyValue]);

fn same_content(a: Content<'_>, b: Content<'_>) -> bool {
  a.0 == b.0 && a.1 == b.1 && multiset_eq(a.2, b.2) && multiset_eq(a.3, b.3)
}

/// Order-insensitive comparison that respects multiplicity. `Value` holds
/// floats, so neither hashing nor sorting is available.
fn multiset_eq(a: &[PropertyValue], b: &[PropertyValue]) -> bool {
  if a.len() != b.len() {
    return false;
  }
  let mut used = vec![false; b.len()];
  a.iter().all(|x| {
    let hit = b
      .iter()
      .enumerate()
      .find(|(i, y)| !used[*i] && *y == x)
      .map(|(i, _)| i);
    match hit {
      Some(i) => {
        used[i] = true;
        true
      }
      None => false,
    }
  })
}
