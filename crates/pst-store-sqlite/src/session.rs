//! [`Session`]: every SQL statement the store issues, over one borrowed
//! connection.
//!
//! A session never begins or commits a transaction. [`SqliteStore`] wraps
//! each call in a transaction of its own; a [`Batch`] leaves commit points to
//! its owner.
//!
//! [`SqliteStore`]: crate::SqliteStore
//! [`Batch`]: crate::Batch

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeDelta, TimeZone as _, Utc};
use pst_core::{
  ActivityEntry, ActivityLog, ApprovalState, LogEntry, NewStatement, PropertyValue, SortOrder,
  Statement, StatementQuery, UserActivity,
};
use rusqlite::{
  Connection, OptionalExtension as _, Params, params, params_from_iter, types::Value as SqlValue,
};

use crate::{
  Result,
  encode::{
    RawLogEntry, RawSnak, RawStatement, SNAK_COLUMNS, STATEMENT_COLUMNS, ValueColumns, encode_dt,
  },
};

/// SQL operations over a connection whose transaction someone else owns.
pub struct Session<'c> {
  conn: &'c Connection,
}

impl<'c> Session<'c> {
  pub(crate) fn new(conn: &'c Connection) -> Self { Self { conn } }

  #[cfg(test)]
  pub(crate) fn conn(&self) -> &Connection { self.conn }

  // ── Snaks ─────────────────────────────────────────────────────────────

  fn insert_snak(&self, pv: &PropertyValue) -> Result<i64> {
    let cols = ValueColumns::encode(&pv.value)?;
    self.conn.prepare_cached(
      "INSERT INTO snak (property, svalue, dvalue, tvalue, lat, lng, \"precision\", lang, vtype)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?
    .execute(params![
      pv.property,
      cols.svalue,
      cols.dvalue,
      cols.tvalue,
      cols.lat,
      cols.lng,
      cols.precision,
      cols.lang,
      cols.vtype,
    ])?;
    Ok(self.conn.last_insert_rowid())
  }

  /// The id of an existing snak with exactly this content, if any.
  pub fn find_snak(&self, pv: &PropertyValue) -> Result<Option<i64>> {
    let (matcher, values) = ValueColumns::encode(&pv.value)?.matcher("snak.");
    let sql = format!(
      "SELECT snak.id FROM snak WHERE snak.property = ? AND {matcher} ORDER BY snak.id LIMIT 1"
    );

    let mut args = Vec::with_capacity(values.len() + 1);
    args.push(SqlValue::Text(pv.property.clone()));
    args.extend(values);

    let id = self
      .conn
      .prepare_cached(&sql)?
      .query_row(params_from_iter(args), |r| r.get(0))
      .optional()?;
    Ok(id)
  }

  fn get_or_add_snak(&self, pv: &PropertyValue, check_duplicates: bool) -> Result<i64> {
    if check_duplicates {
      if let Some(id) = self.find_snak(pv)? {
        return Ok(id);
      }
    }
    self.insert_snak(pv)
  }

  pub fn get_snak(&self, id: i64) -> Result<PropertyValue> {
    let raw = self
      .conn
      .prepare_cached(&format!("SELECT {SNAK_COLUMNS} FROM snak WHERE snak.id = ?1"))?
      .query_row(params![id], RawSnak::from_row)
      .optional()?
      .ok_or(pst_core::Error::SnakNotFound(id))?;
    raw.into_property_value()
  }

  fn linked_snaks(&self, table: &str, stmt: i64) -> Result<Vec<PropertyValue>> {
    let sql = format!(
      "SELECT {SNAK_COLUMNS} FROM {table}
       JOIN snak ON snak.id = {table}.snak
       WHERE {table}.stmt = ?1
       ORDER BY {table}.rowid"
    );
    let raws = self
      .conn
      .prepare_cached(&sql)?
      .query_map(params![stmt], RawSnak::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawSnak::into_property_value).collect()
  }

  // ── Statements: writes ────────────────────────────────────────────────

  pub fn add_statement(&self, st: &NewStatement, check_duplicates: bool) -> Result<i64> {
    let state = stored_code(st.approval_state)?;
    let mainsnak = self.get_or_add_snak(&st.property_value, check_duplicates)?;

    self.conn.prepare_cached(
      "INSERT INTO statement (subject, mainsnak, dataset, upload, state)
       VALUES (?1, ?2, ?3, ?4, ?5)",
    )?
    .execute(params![st.qid, mainsnak, st.dataset, st.upload, state])?;
    let id = self.conn.last_insert_rowid();

    for (table, snaks) in [("qualifier", &st.qualifiers), ("source", &st.sources)] {
      for pv in snaks {
        let snak = self.get_or_add_snak(pv, check_duplicates)?;
        self
          .conn
          .prepare_cached(&format!("INSERT INTO {table} (stmt, snak) VALUES (?1, ?2)"))?
          .execute(params![id, snak])?;
      }
    }

    Ok(id)
  }

  pub fn update_statement(&self, id: i64, state: ApprovalState) -> Result<()> {
    let code = stored_code(state)?;
    let changed = self
      .conn
      .prepare_cached("UPDATE statement SET state = ?1 WHERE id = ?2")?
      .execute(params![code, id])?;
    if changed == 0 {
      return Err(pst_core::Error::StatementNotFound(id).into());
    }
    Ok(())
  }

  pub fn add_userlog(&self, user: &str, id: i64, state: ApprovalState) -> Result<()> {
    let code = stored_code(state)?;
    self
      .conn
      .prepare_cached("INSERT INTO userlog (user, stmt, state, changed) VALUES (?1, ?2, ?3, ?4)")?
      .execute(params![user, id, code, encode_dt(Utc::now())])?;
    Ok(())
  }

  /// Read, update, and log in one go. Returns the statement as it was.
  pub fn transition(&self, id: i64, state: ApprovalState, user: &str) -> Result<Statement> {
    stored_code(state)?;
    let before = self.get_statement(id)?;
    self.update_statement(id, state)?;
    if state.is_user_tracked() {
      self.add_userlog(user, id, state)?;
    }
    Ok(before)
  }

  /// Qualifier and source links cascade; snaks and the user log stay.
  pub fn delete_statements(&self, state: ApprovalState) -> Result<usize> {
    let code = stored_code(state)?;
    let deleted = self.conn.execute("DELETE FROM statement WHERE state = ?1", params![code])?;
    Ok(deleted)
  }

  // ── Statements: reads ─────────────────────────────────────────────────

  fn build(&self, raw: RawStatement) -> Result<Statement> {
    let main = self.get_snak(raw.mainsnak)?;
    let qualifiers = self.linked_snaks("qualifier", raw.id)?;
    let sources = self.linked_snaks("source", raw.id)?;
    let activities = self.log_entries(raw.id)?;
    raw.into_statement(main, qualifiers, sources, activities)
  }

  fn statements<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Statement>> {
    let raws = self
      .conn
      .prepare_cached(sql)?
      .query_map(params, RawStatement::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(|raw| self.build(raw)).collect()
  }

  fn log_entries(&self, stmt: i64) -> Result<Vec<LogEntry>> {
    let raws = self
      .conn
      .prepare_cached("SELECT user, state, changed FROM userlog WHERE stmt = ?1 ORDER BY id")?
      .query_map(params![stmt], RawLogEntry::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawLogEntry::into_log_entry).collect()
  }

  pub fn get_statement(&self, id: i64) -> Result<Statement> {
    let raw = self
      .conn
      .prepare_cached(&format!(
        "SELECT {STATEMENT_COLUMNS} FROM statement WHERE statement.id = ?1"
      ))?
      .query_row(params![id], RawStatement::from_row)
      .optional()?
      .ok_or(pst_core::Error::StatementNotFound(id))?;
    self.build(raw)
  }

  pub fn get_statements_by_qid(
    &self,
    qid: &str,
    state: ApprovalState,
    dataset: Option<&str>,
  ) -> Result<Vec<Statement>> {
    let (code, any_state) = state_filter(state);
    let (tag, any_dataset) = dataset_filter(dataset);
    self.statements(
      &format!(
        "SELECT {STATEMENT_COLUMNS} FROM statement
         WHERE subject = ?1 AND (state = ?2 OR ?3) AND (dataset = ?4 OR ?5)
         ORDER BY id"
      ),
      params![qid, code, any_state, tag, any_dataset],
    )
  }

  pub fn get_random_statements(
    &self,
    count: usize,
    state: ApprovalState,
  ) -> Result<Vec<Statement>> {
    let (code, any_state) = state_filter(state);
    self.statements(
      &format!(
        "SELECT {STATEMENT_COLUMNS} FROM statement
         WHERE (state = ?1 OR ?2)
           AND id >= abs(random() % (SELECT max(id) FROM statement))
         ORDER BY id LIMIT ?3"
      ),
      params![code, any_state, count as i64],
    )
  }

  pub fn get_random_qid(&self, state: ApprovalState, dataset: Option<&str>) -> Result<String> {
    let (code, any_state) = state_filter(state);
    let (tag, any_dataset) = dataset_filter(dataset);
    let qid = self
      .conn
      .prepare_cached(
        "SELECT subject FROM statement
         WHERE (state = ?1 OR ?2) AND (dataset = ?3 OR ?4)
           AND id >= abs(random() % (
             SELECT max(id) FROM statement WHERE (state = ?1 OR ?2) AND (dataset = ?3 OR ?4)
           ))
         ORDER BY id LIMIT 1",
      )?
      .query_row(params![code, any_state, tag, any_dataset], |r| r.get(0))
      .optional()?
      .ok_or(pst_core::Error::NoEntityFound)?;
    Ok(qid)
  }

  pub fn get_all_statements(&self, query: &StatementQuery) -> Result<Vec<Statement>> {
    let (code, any_state) = state_filter(query.state);
    let (tag, any_dataset) = dataset_filter(query.dataset.as_deref());

    let mut sql = format!(
      "SELECT {STATEMENT_COLUMNS} FROM statement
       JOIN snak ON statement.mainsnak = snak.id
       WHERE (statement.state = ? OR ?) AND (statement.dataset = ? OR ?)
         AND (snak.property = ? OR ?)"
    );
    let mut args = vec![
      code.map_or(SqlValue::Null, SqlValue::Integer),
      flag(any_state),
      SqlValue::Text(tag.to_owned()),
      flag(any_dataset),
      SqlValue::Text(query.property.clone().unwrap_or_default()),
      flag(query.property.is_none()),
    ];

    if let Some(value) = &query.value {
      let (matcher, values) = ValueColumns::encode(value)?.matcher("snak.");
      sql.push_str(" AND ");
      sql.push_str(&matcher);
      args.extend(values);
    }

    sql.push_str(match query.order {
      SortOrder::ById => " ORDER BY statement.id",
      SortOrder::BySubject => " ORDER BY statement.subject, statement.id",
    });
    sql.push_str(" LIMIT ? OFFSET ?");
    args.push(SqlValue::Integer(query.limit as i64));
    args.push(SqlValue::Integer(query.offset as i64));

    self.statements(&sql, params_from_iter(args))
  }

  pub fn get_datasets(&self) -> Result<Vec<String>> {
    let datasets = self
      .conn
      .prepare_cached("SELECT DISTINCT dataset FROM statement ORDER BY dataset")?
      .query_map([], |r| r.get(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(datasets)
  }

  pub fn unapproved_subjects_after(&self, start_id: i64) -> Result<Vec<String>> {
    let unapproved = stored_code(ApprovalState::Unapproved)?;
    let subjects = self
      .conn
      .prepare_cached(
        "SELECT DISTINCT subject FROM statement WHERE state = ?1 AND id > ?2 ORDER BY subject",
      )?
      .query_map(params![unapproved, start_id], |r| r.get(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(subjects)
  }

  // ── Aggregates ────────────────────────────────────────────────────────

  pub fn count_statements(&self, dataset: Option<&str>) -> Result<i64> {
    let (tag, any_dataset) = dataset_filter(dataset);
    let n = self
      .conn
      .prepare_cached("SELECT count(*) FROM statement WHERE dataset = ?1 OR ?2")?
      .query_row(params![tag, any_dataset], |r| r.get(0))?;
    Ok(n)
  }

  pub fn count_statements_by_state(
    &self,
    state: ApprovalState,
    dataset: Option<&str>,
  ) -> Result<i64> {
    let (code, any_state) = state_filter(state);
    let (tag, any_dataset) = dataset_filter(dataset);
    let n = self
      .conn
      .prepare_cached(
        "SELECT count(*) FROM statement WHERE (state = ?1 OR ?2) AND (dataset = ?3 OR ?4)",
      )?
      .query_row(params![code, any_state, tag, any_dataset], |r| r.get(0))?;
    Ok(n)
  }

  pub fn count_users(&self, dataset: Option<&str>) -> Result<i64> {
    let (tag, any_dataset) = dataset_filter(dataset);
    let n = self
      .conn
      .prepare_cached(
        "SELECT count(DISTINCT userlog.user) FROM userlog
         LEFT JOIN statement ON statement.id = userlog.stmt
         WHERE statement.dataset = ?1 OR ?2",
      )?
      .query_row(params![tag, any_dataset], |r| r.get(0))?;
    Ok(n)
  }

  pub fn get_top_users(&self, dataset: Option<&str>, limit: usize) -> Result<Vec<UserActivity>> {
    let (tag, any_dataset) = dataset_filter(dataset);
    let users = self
      .conn
      .prepare_cached(
        "SELECT userlog.user, count(userlog.id) AS activities FROM userlog
         LEFT JOIN statement ON statement.id = userlog.stmt
         WHERE userlog.state NOT IN (?1, ?2) AND (statement.dataset = ?3 OR ?4)
         GROUP BY userlog.user
         ORDER BY activities DESC, userlog.user
         LIMIT ?5",
      )?
      .query_map(
        params![
          stored_code(ApprovalState::Duplicate)?,
          stored_code(ApprovalState::Blacklisted)?,
          tag,
          any_dataset,
          limit as i64,
        ],
        |r| Ok(UserActivity { user: r.get(0)?, activities: r.get(1)? }),
      )?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
  }

  /// Top users over the whole window, then their approved and rejected
  /// counts per period. Periods end at "now", "now - period", and so on; each
  /// one starts at midnight.
  pub fn get_activity_log(
    &self,
    period_days: u32,
    periods: u32,
    top_n: usize,
  ) -> Result<ActivityLog> {
    let now = Utc::now();
    let out_of_range = || {
      pst_core::Error::InvalidValue(format!("activity window of {periods} x {period_days} days"))
    };
    let period = TimeDelta::try_days(i64::from(period_days))
      .filter(|p| !p.is_zero())
      .ok_or_else(out_of_range)?;
    let window_start = i64::from(period_days)
      .checked_mul(i64::from(periods))
      .and_then(TimeDelta::try_days)
      .and_then(|window| now.checked_sub_signed(window))
      .ok_or_else(out_of_range)?;

    let users: BTreeSet<String> = self
      .conn
      .prepare_cached(
        "SELECT user, count(id) AS activities FROM userlog
         WHERE changed > ?1
         GROUP BY user ORDER BY activities DESC, user LIMIT ?2",
      )?
      .query_map(params![encode_dt(midnight(window_start)), top_n as i64], |r| r.get(0))?
      .collect::<rusqlite::Result<_>>()?;

    let mut activities = Vec::with_capacity(periods.min(1024) as usize);
    let mut end = now;
    for _ in 0..periods {
      let next = end.checked_sub_signed(period).ok_or_else(out_of_range)?;
      let start = midnight(next);
      let approved = self.period_counts(ApprovalState::Approved, start, end, &users)?;
      let rejected = self.period_counts(ApprovalState::Wrong, start, end, &users)?;
      activities.push(ActivityEntry { date: end.date_naive(), approved, rejected });
      end = next;
    }

    Ok(ActivityLog { users, activities })
  }

  fn period_counts(
    &self,
    state: ApprovalState,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    users: &BTreeSet<String>,
  ) -> Result<BTreeMap<String, i64>> {
    let rows = self
      .conn
      .prepare_cached(
        "SELECT user, count(id) FROM userlog
         WHERE state = ?1 AND changed > ?2 AND changed <= ?3
         GROUP BY user",
      )?
      .query_map(params![stored_code(state)?, encode_dt(start), encode_dt(end)], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows.into_iter().filter(|(user, _)| users.contains(user)).collect())
  }
}

// ─── Filters ─────────────────────────────────────────────────────────────────

/// The storage code, or `InvalidState` for `Any`.
fn stored_code(state: ApprovalState) -> Result<i64> {
  state
    .code()
    .ok_or_else(|| pst_core::Error::InvalidState(state.as_str().to_owned()).into())
}

/// `(code, match_all)` for a `(state = ? OR ?)` clause.
fn state_filter(state: ApprovalState) -> (Option<i64>, bool) {
  (state.code(), state == ApprovalState::Any)
}

/// `(tag, match_all)` for a `(dataset = ? OR ?)` clause.
fn dataset_filter(dataset: Option<&str>) -> (&str, bool) {
  (dataset.unwrap_or(""), dataset.is_none())
}

fn flag(b: bool) -> SqlValue { SqlValue::Integer(i64::from(b)) }

fn midnight(dt: DateTime<Utc>) -> DateTime<Utc> {
  dt.date_naive()
    .and_hms_opt(0, 0, 0)
    .map_or(dt, |start| Utc.from_utc_datetime(&start))
}
