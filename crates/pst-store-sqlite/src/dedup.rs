//! The offline duplicate sweep.
//!
//! For every subject that gained unapproved statements after a given id, all
//! of its statements are compared pairwise. A later statement whose content
//! equals an earlier one and is still unapproved becomes `Duplicate`. The
//! comparison is quadratic in the number of statements per subject.

use pst_core::ApprovalState;
use serde::Serialize;
use tracing::info;

use crate::{Batch, Result};

/// Counters from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupReport {
  /// Subjects examined.
  pub subjects: usize,
  /// Statement pairs compared.
  pub pairs:    u64,
  /// Statements newly marked `Duplicate`.
  pub marked:   u64,
}

/// Run the sweep inside `batch`, committing every `progress_every` pairs.
///
/// The caller finishes the batch. Marking writes no user-log entries.
pub fn mark_duplicates(
  batch: &mut Batch,
  start_id: i64,
  progress_every: u64,
) -> Result<DedupReport> {
  info!(start_id, "duplicate sweep: start");
  let subjects = batch.session()?.unapproved_subjects_after(start_id)?;
  info!(subjects = subjects.len(), "duplicate sweep: subjects selected");

  let mut report = DedupReport { subjects: subjects.len(), ..DedupReport::default() };

  for qid in &subjects {
    let mut statements = batch.session()?.get_statements_by_qid(qid, ApprovalState::Any, None)?;

    for i in 0..statements.len() {
      for j in (i + 1)..statements.len() {
        if statements[j].approval_state == ApprovalState::Unapproved
          && statements[i].content_eq(&statements[j])
        {
          batch.session()?.update_statement(statements[j].id, ApprovalState::Duplicate)?;
          statements[j].approval_state = ApprovalState::Duplicate;
          report.marked += 1;
        }
        report.pairs += 1;

        if progress_every > 0 && report.pairs % progress_every == 0 {
          info!(pairs = report.pairs, marked = report.marked, "duplicate sweep: progress");
          batch.commit()?;
        }
      }
    }
  }

  info!(
    subjects = report.subjects,
    pairs = report.pairs,
    marked = report.marked,
    "duplicate sweep: done"
  );
  Ok(report)
}
