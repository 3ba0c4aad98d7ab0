//! Integration tests for `SqliteStore` against in-memory and file databases.

use pst_core::{
  ApprovalState, Classify, ErrorClass, NewStatement, Precision, SortOrder, StatementQuery,
  StatementStore, Time, Value,
};

use crate::{Error, SqliteStore, mark_duplicates};

fn store() -> SqliteStore { SqliteStore::open_in_memory().expect("in-memory store") }

fn item(qid: &str, property: &str, target: &str) -> NewStatement {
  NewStatement::new(qid, property, Value::entity(target))
}

fn count_rows(s: &SqliteStore, sql: &str) -> i64 {
  s.read(|session| Ok(session.conn().query_row(sql, [], |r| r.get(0))?)).unwrap()
}

fn mainsnak(s: &SqliteStore, id: i64) -> i64 {
  s.read(|session| {
    Ok(session.conn().query_row("SELECT mainsnak FROM statement WHERE id = ?1", [id], |r| {
      r.get(0)
    })?)
  })
  .unwrap()
}

// ─── Values ──────────────────────────────────────────────────────────────────

#[test]
fn every_value_variant_roundtrips() {
  let s = store();
  let values = [
    Value::entity("Q42"),
    Value::literal("Douglas Adams", "en"),
    Value::literal("untagged", ""),
    Value::quantity("-12.50").unwrap(),
    Value::Time(Time::date(1952, 3, 11)),
    Value::Time(Time::new(1952, 3, 11, 14, 30, 5, Precision::Second)),
    Value::Time(Time::new(1900, 0, 0, 0, 0, 0, Precision::Century)),
    Value::location(52.516, 13.383),
  ];

  for value in values {
    let id = s.add_statement(&NewStatement::new("Q1", "P1", value.clone()), true).unwrap();
    let fetched = s.get_statement(id).unwrap();
    assert_eq!(fetched.property_value.value, value);
  }
}

#[test]
fn time_before_year_1000_is_rejected() {
  let s = store();
  let early = NewStatement::new("Q1", "P569", Value::Time(Time::year(999)));
  let err = s.add_statement(&early, false).unwrap_err();
  assert_eq!(err.class(), ErrorClass::InvalidInput);
  assert_eq!(s.count_statements(None).unwrap(), 0);
}

#[test]
fn day_precision_without_day_is_rejected() {
  let s = store();
  let dayless = Time::new(2000, 0, 0, 0, 0, 0, Precision::Day);
  let err = s.add_statement(&NewStatement::new("Q1", "P569", Value::Time(dayless)), false);
  assert_eq!(err.unwrap_err().class(), ErrorClass::InvalidInput);
}

#[test]
fn non_finite_location_is_rejected_before_any_write() {
  let s = store();
  s.add_statement(&item("Q1", "P31", "Q5"), false).unwrap();

  for bad in [Value::location(f64::NAN, 13.0), Value::location(52.5, f64::INFINITY)] {
    let err = s.add_statement(&NewStatement::new("Q1", "P625", bad), false).unwrap_err();
    assert_eq!(err.class(), ErrorClass::InvalidInput);
  }

  assert_eq!(count_rows(&s, "SELECT count(*) FROM snak"), 1);
  assert_eq!(s.get_statements_by_qid("Q1", ApprovalState::Any, None).unwrap().len(), 1);
}

#[test]
fn unnormalized_times_share_a_snak_and_deduplicate() {
  let s = store();
  let year = Time::year(1900);
  let from_json: Value = serde_json::from_str(
    r#"{"type":"time","data":{"year":1900,"month":5,"day":3,
        "hour":0,"minute":0,"second":0,"precision":9}}"#,
  )
  .unwrap();
  let literal = Time { month: 5, day: 3, ..year };

  let ids: Vec<i64> = [Value::Time(year), from_json, Value::Time(literal)]
    .into_iter()
    .map(|v| s.add_statement(&NewStatement::new("Q1", "P569", v), true).unwrap())
    .collect();

  assert_eq!(mainsnak(&s, ids[0]), mainsnak(&s, ids[1]));
  assert_eq!(mainsnak(&s, ids[0]), mainsnak(&s, ids[2]));
  assert_eq!(s.get_statement(ids[2]).unwrap().property_value.value, Value::Time(year));

  let report = s.mark_duplicates(0, 1000).unwrap();
  assert_eq!(report.marked, 2);
}

#[test]
fn qualifier_with_bad_time_rolls_back_the_whole_statement() {
  let s = store();
  let st = item("Q1", "P31", "Q5").with_qualifier("P580", Value::Time(Time::year(200)));
  assert!(s.add_statement(&st, false).is_err());
  assert_eq!(count_rows(&s, "SELECT count(*) FROM snak"), 0);
}

// ─── Statements ──────────────────────────────────────────────────────────────

#[test]
fn statement_roundtrip_with_qualifiers_and_sources() {
  let s = store();
  let new = item("Q1", "P31", "Q5")
    .with_qualifier("P580", Value::Time(Time::year(1900)))
    .with_qualifier("P1545", Value::quantity("2").unwrap())
    .with_source("P854", Value::literal("http://example.org", ""))
    .with_source("P143", Value::entity("Q328"))
    .with_dataset("freebase")
    .with_upload(1_700_000_000_000);

  let id = s.add_statement(&new, false).unwrap();
  let fetched = s.get_statement(id).unwrap();

  assert_eq!(fetched.id, id);
  assert_eq!(fetched.dataset, "freebase");
  assert_eq!(fetched.upload, 1_700_000_000_000);
  assert_eq!(fetched.approval_state, ApprovalState::Unapproved);
  assert_eq!(fetched.qualifiers.len(), 2);
  assert_eq!(fetched.sources.len(), 2);
  assert!(fetched.activities.is_empty());
  assert!(new.same_content_as(&fetched));
}

#[test]
fn missing_statement_is_not_found() {
  let s = store();
  let err = s.get_statement(404).unwrap_err();
  assert!(matches!(err, Error::Core(pst_core::Error::StatementNotFound(404))));
  assert_eq!(err.class(), ErrorClass::NotFound);
}

#[test]
fn any_is_not_a_storable_state() {
  let s = store();
  let err = s.add_statement(&item("Q1", "P1", "Q2").with_state(ApprovalState::Any), false);
  assert_eq!(err.unwrap_err().class(), ErrorClass::InvalidInput);
}

#[test]
fn snaks_are_reused_only_when_checking_duplicates() {
  let s = store();
  let a = s.add_statement(&item("Q1", "P31", "Q5"), true).unwrap();
  let b = s.add_statement(&item("Q2", "P31", "Q5"), true).unwrap();
  assert_eq!(mainsnak(&s, a), mainsnak(&s, b));

  let c = s.add_statement(&item("Q3", "P31", "Q5"), false).unwrap();
  assert_ne!(mainsnak(&s, a), mainsnak(&s, c));
}

#[test]
fn snak_lookup_distinguishes_language_and_precision() {
  let s = store();
  let literal = |lang: &str| NewStatement::new("Q1", "P1", Value::literal("x", lang));
  let en = s.add_statement(&literal("en"), true).unwrap();
  let de = s.add_statement(&literal("de"), true).unwrap();
  assert_ne!(mainsnak(&s, en), mainsnak(&s, de));

  let year = Value::Time(Time::new(1900, 0, 0, 0, 0, 0, Precision::Year));
  let decade = Value::Time(Time::new(1900, 0, 0, 0, 0, 0, Precision::Decade));
  let y = s.add_statement(&NewStatement::new("Q1", "P2", year), true).unwrap();
  let d = s.add_statement(&NewStatement::new("Q1", "P2", decade), true).unwrap();
  assert_ne!(mainsnak(&s, y), mainsnak(&s, d));
}

#[test]
fn statements_by_qid_filter_state_and_dataset() {
  let s = store();
  let a = s.add_statement(&item("Q1", "P1", "Q2").with_dataset("ds1"), false).unwrap();
  s.add_statement(&item("Q1", "P1", "Q3").with_dataset("ds2"), false).unwrap();
  s.add_statement(
    &item("Q1", "P1", "Q4").with_dataset("ds1").with_state(ApprovalState::Approved),
    false,
  )
  .unwrap();
  s.add_statement(&item("Q9", "P1", "Q2").with_dataset("ds1"), false).unwrap();

  let all = s.get_statements_by_qid("Q1", ApprovalState::Any, None).unwrap();
  assert_eq!(all.len(), 3);
  assert!(all.windows(2).all(|w| w[0].id < w[1].id));

  let ds1 = s.get_statements_by_qid("Q1", ApprovalState::Any, Some("ds1")).unwrap();
  assert_eq!(ds1.len(), 2);

  let open = s.get_statements_by_qid("Q1", ApprovalState::Unapproved, Some("ds1")).unwrap();
  assert_eq!(open.iter().map(|st| st.id).collect::<Vec<_>>(), vec![a]);
}

// ─── Random access ───────────────────────────────────────────────────────────

#[test]
fn random_qid_exhausts_to_not_found() {
  let s = store();
  for qid in ["Q1", "Q2", "Q3"] {
    s.add_statement(&item(qid, "P1", "Q100"), false).unwrap();
    s.add_statement(&item(qid, "P2", "Q200"), false).unwrap();
  }

  let mut seen = Vec::new();
  for _ in 0..3 {
    let qid = s.get_random_qid(ApprovalState::Unapproved, None).unwrap();
    assert!(!seen.contains(&qid));
    for st in s.get_statements_by_qid(&qid, ApprovalState::Unapproved, None).unwrap() {
      s.update_statement(st.id, ApprovalState::Approved).unwrap();
    }
    seen.push(qid);
  }

  let err = s.get_random_qid(ApprovalState::Unapproved, None).unwrap_err();
  assert!(matches!(err, Error::Core(pst_core::Error::NoEntityFound)));
}

#[test]
fn random_qid_respects_dataset() {
  let s = store();
  s.add_statement(&item("Q1", "P1", "Q2").with_dataset("ds1"), false).unwrap();
  s.add_statement(&item("Q7", "P1", "Q2").with_dataset("ds2"), false).unwrap();
  for _ in 0..10 {
    assert_eq!(s.get_random_qid(ApprovalState::Any, Some("ds2")).unwrap(), "Q7");
  }
  assert!(s.get_random_qid(ApprovalState::Any, Some("nope")).is_err());
}

#[test]
fn random_statements_match_state() {
  let s = store();
  for i in 0..20 {
    let state = if i % 2 == 0 { ApprovalState::Unapproved } else { ApprovalState::Wrong };
    s.add_statement(&item(&format!("Q{i}"), "P1", "Q2").with_state(state), false).unwrap();
  }
  let picked = s.get_random_statements(5, ApprovalState::Wrong).unwrap();
  assert!(picked.len() <= 5);
  assert!(picked.iter().all(|st| st.approval_state == ApprovalState::Wrong));
}

#[test]
fn random_access_on_empty_store() {
  let s = store();
  assert!(s.get_random_statements(3, ApprovalState::Any).unwrap().is_empty());
  assert!(s.get_random_qid(ApprovalState::Any, None).is_err());
}

// ─── Listing ─────────────────────────────────────────────────────────────────

#[test]
fn get_all_statements_paginates() {
  let s = store();
  for i in 0..25 {
    s.add_statement(&item(&format!("Q{i}"), "P1", "Q2"), false).unwrap();
  }
  let page = s.get_all_statements(&StatementQuery::page(20, 10)).unwrap();
  assert_eq!(page.len(), 5);
  assert_eq!(page[0].id, 21);
}

#[test]
fn get_all_statements_filters_on_property_and_value() {
  let s = store();
  s.add_statement(&NewStatement::new("Q1", "P1", Value::literal("a", "en")), false).unwrap();
  s.add_statement(&NewStatement::new("Q2", "P1", Value::literal("a", "de")), false).unwrap();
  s.add_statement(&NewStatement::new("Q3", "P2", Value::literal("a", "en")), false).unwrap();
  s.add_statement(&NewStatement::new("Q4", "P1", Value::quantity("5").unwrap()), false).unwrap();

  let query = StatementQuery {
    property: Some("P1".into()),
    value: Some(Value::literal("a", "en")),
    ..StatementQuery::default()
  };
  let hits = s.get_all_statements(&query).unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].qid, "Q1");

  let query = StatementQuery {
    value: Some(Value::quantity("+5.000").unwrap()),
    ..StatementQuery::default()
  };
  let hits = s.get_all_statements(&query).unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].qid, "Q4");

  let query = StatementQuery { property: Some("P1".into()), ..StatementQuery::default() };
  assert_eq!(s.get_all_statements(&query).unwrap().len(), 3);
}

#[test]
fn get_all_statements_by_subject_groups_entities() {
  let s = store();
  s.add_statement(&item("Q2", "P1", "Q5"), false).unwrap();
  s.add_statement(&item("Q1", "P1", "Q5"), false).unwrap();
  s.add_statement(&item("Q2", "P2", "Q5"), false).unwrap();

  let query =
    StatementQuery { order: SortOrder::BySubject, limit: 100, ..StatementQuery::default() };
  let qids: Vec<_> =
    s.get_all_statements(&query).unwrap().into_iter().map(|st| st.qid).collect();
  assert_eq!(qids, vec!["Q1", "Q2", "Q2"]);
}

#[test]
fn datasets_are_distinct_and_sorted() {
  let s = store();
  for ds in ["wiki", "freebase", "wiki", ""] {
    s.add_statement(&item("Q1", "P1", "Q2").with_dataset(ds), false).unwrap();
  }
  assert_eq!(s.get_datasets().unwrap(), vec!["", "freebase", "wiki"]);
}

// ─── Transitions ─────────────────────────────────────────────────────────────

#[test]
fn transition_updates_state_and_logs_user() {
  let s = store();
  let id = s.add_statement(&item("Q1", "P1", "Q2"), false).unwrap();

  let before = s.transition(id, ApprovalState::Approved, "alice").unwrap();
  assert_eq!(before.approval_state, ApprovalState::Unapproved);

  let after = s.get_statement(id).unwrap();
  assert_eq!(after.approval_state, ApprovalState::Approved);
  assert_eq!(after.activities.len(), 1);
  assert_eq!(after.activities[0].user, "alice");
  assert_eq!(after.activities[0].state, ApprovalState::Approved);
}

#[test]
fn system_transitions_write_no_log() {
  let s = store();
  let id = s.add_statement(&item("Q1", "P1", "Q2"), false).unwrap();
  s.transition(id, ApprovalState::Blacklisted, "bot").unwrap();
  s.transition(id, ApprovalState::Duplicate, "bot").unwrap();
  assert!(s.get_statement(id).unwrap().activities.is_empty());
}

#[test]
fn transition_rejects_any_and_missing_ids() {
  let s = store();
  let id = s.add_statement(&item("Q1", "P1", "Q2"), false).unwrap();

  let err = s.transition(id, ApprovalState::Any, "alice").unwrap_err();
  assert_eq!(err.class(), ErrorClass::InvalidInput);

  let err = s.transition(9999, ApprovalState::Approved, "alice").unwrap_err();
  assert_eq!(err.class(), ErrorClass::NotFound);
  assert_eq!(count_rows(&s, "SELECT count(*) FROM userlog"), 0);
}

#[test]
fn update_missing_statement_is_not_found() {
  let s = store();
  let err = s.update_statement(1, ApprovalState::Approved).unwrap_err();
  assert_eq!(err.class(), ErrorClass::NotFound);
}

// ─── Deletion ────────────────────────────────────────────────────────────────

#[test]
fn delete_by_state_cascades_links_and_keeps_log() {
  let s = store();
  let keep = s.add_statement(&item("Q1", "P1", "Q2"), false).unwrap();
  let qualified = item("Q1", "P1", "Q3").with_qualifier("P580", Value::Time(Time::year(1990)));
  let gone = s.add_statement(&qualified, false).unwrap();
  s.transition(gone, ApprovalState::Wrong, "alice").unwrap();

  assert_eq!(s.delete_statements(ApprovalState::Wrong).unwrap(), 1);
  assert!(s.get_statement(keep).is_ok());
  assert_eq!(s.get_statement(gone).unwrap_err().class(), ErrorClass::NotFound);
  assert_eq!(count_rows(&s, "SELECT count(*) FROM qualifier"), 0);
  assert_eq!(count_rows(&s, "SELECT count(*) FROM userlog"), 1);
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

#[test]
fn per_state_counts_sum_to_total() {
  let s = store();
  let states = [
    ApprovalState::Unapproved,
    ApprovalState::Approved,
    ApprovalState::Wrong,
    ApprovalState::Duplicate,
    ApprovalState::Blacklisted,
    ApprovalState::Skipped,
  ];
  for (i, state) in states.iter().cycle().take(30).enumerate() {
    let ds = if i % 3 == 0 { "ds1" } else { "ds2" };
    s.add_statement(&item(&format!("Q{i}"), "P1", "Q2").with_dataset(ds).with_state(*state), false)
      .unwrap();
  }

  for dataset in [None, Some("ds1"), Some("ds2"), Some("absent")] {
    let total = s.count_statements(dataset).unwrap();
    let sum: i64 = ApprovalState::stored()
      .map(|state| s.count_statements_by_state(state, dataset).unwrap())
      .sum();
    assert_eq!(sum, total, "dataset {dataset:?}");
    assert_eq!(s.count_statements_by_state(ApprovalState::Any, dataset).unwrap(), total);
  }
  assert_eq!(s.count_statements(None).unwrap(), 30);
  assert_eq!(s.count_statements(Some("ds1")).unwrap(), 10);
}

#[test]
fn top_users_skip_system_states() {
  let s = store();
  let ids: Vec<i64> = (0..4)
    .map(|i| s.add_statement(&item(&format!("Q{i}"), "P1", "Q2"), false).unwrap())
    .collect();

  s.add_userlog("bob", ids[0], ApprovalState::Duplicate).unwrap();
  s.add_userlog("bob", ids[1], ApprovalState::Blacklisted).unwrap();
  s.add_userlog("bob", ids[2], ApprovalState::Blacklisted).unwrap();
  s.add_userlog("alice", ids[0], ApprovalState::Approved).unwrap();
  s.add_userlog("alice", ids[1], ApprovalState::Wrong).unwrap();
  s.add_userlog("carol", ids[3], ApprovalState::Approved).unwrap();

  let top = s.get_top_users(None, 10).unwrap();
  let names: Vec<_> = top.iter().map(|u| u.user.as_str()).collect();
  assert_eq!(names, vec!["alice", "carol"]);
  assert_eq!(top[0].activities, 2);

  assert_eq!(s.get_top_users(None, 1).unwrap().len(), 1);
  assert_eq!(s.count_users(None).unwrap(), 3);
}

#[test]
fn user_counts_follow_dataset() {
  let s = store();
  let a = s.add_statement(&item("Q1", "P1", "Q2").with_dataset("ds1"), false).unwrap();
  let b = s.add_statement(&item("Q1", "P1", "Q3").with_dataset("ds2"), false).unwrap();
  s.transition(a, ApprovalState::Approved, "alice").unwrap();
  s.transition(b, ApprovalState::Approved, "bob").unwrap();

  assert_eq!(s.count_users(Some("ds1")).unwrap(), 1);
  assert_eq!(s.get_top_users(Some("ds2"), 10).unwrap()[0].user, "bob");
  assert_eq!(s.count_users(None).unwrap(), 2);
}

#[test]
fn activity_log_counts_recent_decisions() {
  let s = store();
  let ids: Vec<i64> = (0..5)
    .map(|i| s.add_statement(&item(&format!("Q{i}"), "P1", "Q2"), false).unwrap())
    .collect();
  s.transition(ids[0], ApprovalState::Approved, "alice").unwrap();
  s.transition(ids[1], ApprovalState::Approved, "alice").unwrap();
  s.transition(ids[2], ApprovalState::Wrong, "alice").unwrap();
  s.transition(ids[3], ApprovalState::Wrong, "bob").unwrap();
  s.transition(ids[4], ApprovalState::Skipped, "carol").unwrap();

  let log = s.get_activity_log(7, 4, 2).unwrap();
  assert_eq!(log.users.len(), 2);
  assert!(log.users.contains("alice"));
  assert_eq!(log.activities.len(), 4);

  let current = &log.activities[0];
  assert_eq!(current.approved.get("alice"), Some(&2));
  assert_eq!(current.rejected.get("alice"), Some(&1));
  assert!(log.activities[1..].iter().all(|e| e.approved.is_empty() && e.rejected.is_empty()));
  assert!(log.activities.windows(2).all(|w| w[0].date > w[1].date));
}

#[test]
fn activity_log_rejects_unrepresentable_windows() {
  let s = store();
  for (period_days, periods) in [(u32::MAX, u32::MAX), (u32::MAX, 1), (0, 4)] {
    let err = s.get_activity_log(period_days, periods, 10).unwrap_err();
    assert_eq!(err.class(), ErrorClass::InvalidInput, "{period_days} x {periods}");
  }
}

// ─── Duplicate sweep ─────────────────────────────────────────────────────────

#[test]
fn k_identical_statements_leave_one_unapproved() {
  let s = store();
  let st = item("Q1", "P31", "Q5").with_source("P143", Value::entity("Q328"));
  for _ in 0..4 {
    s.add_statement(&st, false).unwrap();
  }
  s.add_statement(&item("Q1", "P31", "Q6"), false).unwrap();

  let report = s.mark_duplicates(0, 1000).unwrap();
  assert_eq!(report.subjects, 1);
  assert_eq!(report.marked, 3);
  assert_eq!(report.pairs, 10);

  let states: Vec<_> = s
    .get_statements_by_qid("Q1", ApprovalState::Any, None)
    .unwrap()
    .into_iter()
    .map(|st| st.approval_state)
    .collect();
  assert_eq!(states, vec![
    ApprovalState::Unapproved,
    ApprovalState::Duplicate,
    ApprovalState::Duplicate,
    ApprovalState::Duplicate,
    ApprovalState::Unapproved,
  ]);
}

#[test]
fn identical_pair_in_one_dataset() {
  let s = store();
  let st = item("Q1", "P1", "Q2").with_dataset("ds1");
  s.add_statement(&st, false).unwrap();
  s.add_statement(&st, false).unwrap();

  s.mark_duplicates(0, 10_000).unwrap();

  assert_eq!(s.count_statements_by_state(ApprovalState::Unapproved, Some("ds1")).unwrap(), 1);
  assert_eq!(s.count_statements_by_state(ApprovalState::Duplicate, Some("ds1")).unwrap(), 1);
  assert_eq!(count_rows(&s, "SELECT count(*) FROM userlog"), 0);
}

#[test]
fn sweep_ignores_source_order_but_not_content() {
  let s = store();
  let base = item("Q1", "P1", "Q2");
  let retrieved = Value::Time(Time::year(2015));
  let forward = base
    .clone()
    .with_source("P143", Value::entity("Q1"))
    .with_source("P813", retrieved.clone());
  let reversed = base
    .clone()
    .with_source("P813", retrieved)
    .with_source("P143", Value::entity("Q1"));
  s.add_statement(&forward, false).unwrap();
  s.add_statement(&reversed, false).unwrap();
  s.add_statement(&base.with_source("P143", Value::entity("Q2")), false).unwrap();

  assert_eq!(s.mark_duplicates(0, 100).unwrap().marked, 1);
}

#[test]
fn sweep_marks_unapproved_copy_of_approved_statement() {
  let s = store();
  let st = item("Q1", "P1", "Q2");
  let first = s.add_statement(&st, false).unwrap();
  s.transition(first, ApprovalState::Approved, "alice").unwrap();
  let second = s.add_statement(&st, false).unwrap();

  s.mark_duplicates(0, 100).unwrap();
  assert_eq!(s.get_statement(first).unwrap().approval_state, ApprovalState::Approved);
  assert_eq!(s.get_statement(second).unwrap().approval_state, ApprovalState::Duplicate);
}

#[test]
fn sweep_starts_after_given_id() {
  let s = store();
  let st = item("Q1", "P1", "Q2");
  s.add_statement(&st, false).unwrap();
  let last = s.add_statement(&st, false).unwrap();

  let report = s.mark_duplicates(last, 100).unwrap();
  assert_eq!(report.subjects, 0);
  assert_eq!(report.marked, 0);
}

#[test]
fn dropped_batch_rolls_back() {
  let s = store();
  let st = item("Q1", "P1", "Q2");
  s.add_statement(&st, false).unwrap();
  s.add_statement(&st, false).unwrap();

  {
    let mut batch = s.batch().unwrap();
    let report = mark_duplicates(&mut batch, 0, 0).unwrap();
    assert_eq!(report.marked, 1);
  }

  assert_eq!(s.count_statements_by_state(ApprovalState::Duplicate, None).unwrap(), 0);
}

#[test]
fn batch_commit_points_survive_drop() {
  let s = store();
  {
    let mut batch = s.batch().unwrap();
    batch.session().unwrap().add_statement(&item("Q1", "P1", "Q2"), false).unwrap();
    batch.commit().unwrap();
    batch.session().unwrap().add_statement(&item("Q2", "P1", "Q2"), false).unwrap();
  }
  assert_eq!(s.count_statements(None).unwrap(), 1);
}

// ─── File-backed store ───────────────────────────────────────────────────────

#[test]
fn file_store_persists_across_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("statements.db");

  let id = {
    let s = SqliteStore::open(&path, 4).unwrap();
    let id = s.add_statement(&item("Q1", "P1", "Q2").with_dataset("ds1"), true).unwrap();
    s.transition(id, ApprovalState::Approved, "alice").unwrap();
    id
  };

  let s = SqliteStore::open(&path, 2).unwrap();
  let st = s.get_statement(id).unwrap();
  assert_eq!(st.approval_state, ApprovalState::Approved);
  assert_eq!(st.activities.len(), 1);
  assert_eq!(s.get_datasets().unwrap(), vec!["ds1"]);
}

#[test]
fn file_store_serves_concurrent_readers() {
  let dir = tempfile::tempdir().unwrap();
  let s = SqliteStore::open(dir.path().join("statements.db"), 4).unwrap();
  for i in 0..10 {
    s.add_statement(&item(&format!("Q{i}"), "P1", "Q2"), false).unwrap();
  }

  std::thread::scope(|scope| {
    for _ in 0..4 {
      scope.spawn(|| assert_eq!(s.count_statements(None).unwrap(), 10));
    }
  });
}
