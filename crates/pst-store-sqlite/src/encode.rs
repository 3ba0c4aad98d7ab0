//! Encoding and decoding helpers between domain types and SQLite rows.
//!
//! Each [`Value`] variant owns a fixed subset of the `snak` columns. That
//! mapping lives in exactly one place, [`ValueColumns`], which drives snak
//! inserts, exact-match lookups, and value filters alike.
//!
//! Log timestamps are stored as fixed-width RFC 3339 strings so that string
//! comparison in SQL matches chronological order.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use pst_core::{
  ApprovalState, Literal, Location, LogEntry, Precision, PropertyValue, Quantity, Statement,
  Time, Value, ValueType,
};
use rusqlite::{Row, types::Value as SqlValue};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Time ────────────────────────────────────────────────────────────────────

/// `YYYY-MM-DD HH:MM:SS`, with zeroed fields kept as `00`.
pub fn encode_time(t: &Time) -> String {
  format!(
    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
    t.year, t.month, t.day, t.hour, t.minute, t.second
  )
}

pub fn decode_time(s: &str, precision: Precision) -> Result<Time> {
  fn field<T: FromStr>(part: Option<&str>) -> Option<T> { part?.parse().ok() }

  let parse = || {
    let (date, clock) = s.split_once(' ')?;
    let mut d = date.splitn(3, '-');
    let mut c = clock.splitn(3, ':');
    Some(Time {
      year: field(d.next())?,
      month: field(d.next())?,
      day: field(d.next())?,
      hour: field(c.next())?,
      minute: field(c.next())?,
      second: field(c.next())?,
      precision,
    })
  };
  parse().ok_or_else(|| Error::DateParse(format!("malformed time value: {s:?}")))
}

// ─── Value columns ───────────────────────────────────────────────────────────

/// The `snak` columns one value occupies. Columns a variant does not use stay
/// `None` and are neither written nor matched on.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueColumns {
  pub vtype:     &'static str,
  pub svalue:    Option<String>,
  pub dvalue:    Option<String>,
  pub tvalue:    Option<String>,
  pub lat:       Option<f64>,
  pub lng:       Option<f64>,
  pub precision: Option<i64>,
  pub lang:      Option<String>,
}

impl ValueColumns {
  fn empty(vtype: ValueType) -> Self {
    Self {
      vtype:     vtype.discriminant(),
      svalue:    None,
      dvalue:    None,
      tvalue:    None,
      lat:       None,
      lng:       None,
      precision: None,
      lang:      None,
    }
  }

  /// Map a value onto its columns, rejecting values the store cannot hold.
  pub fn encode(value: &Value) -> Result<Self> {
    let base = Self::empty(value.value_type());
    Ok(match value {
      Value::Entity(qid) => Self { svalue: Some(qid.clone()), ..base },
      Value::Literal(Literal { content, language }) => Self {
        svalue: Some(content.clone()),
        lang: Some(language.clone()),
        ..base
      },
      Value::Quantity(q) => Self { dvalue: Some(q.as_str().to_owned()), ..base },
      Value::Time(t) => {
        let t = t.normalized();
        t.validate()?;
        Self {
          tvalue: Some(encode_time(&t)),
          precision: Some(i64::from(t.precision.code())),
          ..base
        }
      }
      Value::Location(location) => {
        location.validate()?;
        Self { lat: Some(location.latitude), lng: Some(location.longitude), ..base }
      }
    })
  }

  /// An SQL conjunction matching exactly these columns, with its parameters
  /// in placeholder order. `table` qualifies column names (`"snak."` or `""`).
  pub fn matcher(&self, table: &str) -> (String, Vec<SqlValue>) {
    let mut sql = format!("{table}vtype = ?");
    let mut params = vec![SqlValue::Text(self.vtype.to_owned())];

    let mut push = |column: &str, value: Option<SqlValue>| {
      if let Some(v) = value {
        sql.push_str(&format!(" AND {table}{column} = ?"));
        params.push(v);
      }
    };
    push("svalue", self.svalue.clone().map(SqlValue::Text));
    push("dvalue", self.dvalue.clone().map(SqlValue::Text));
    push("tvalue", self.tvalue.clone().map(SqlValue::Text));
    push("lat", self.lat.map(SqlValue::Real));
    push("lng", self.lng.map(SqlValue::Real));
    push("\"precision\"", self.precision.map(SqlValue::Integer));
    push("lang", self.lang.clone().map(SqlValue::Text));

    (sql, params)
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawSnak::from_row`].
pub const SNAK_COLUMNS: &str = "snak.id, snak.property, snak.svalue, snak.dvalue, \
   snak.tvalue, snak.lat, snak.lng, snak.\"precision\", snak.lang, snak.vtype";

/// Raw values read directly from a `snak` row.
pub struct RawSnak {
  pub id:        i64,
  pub property:  String,
  pub svalue:    Option<String>,
  pub dvalue:    Option<String>,
  pub tvalue:    Option<String>,
  pub lat:       Option<f64>,
  pub lng:       Option<f64>,
  pub precision: Option<i64>,
  pub lang:      Option<String>,
  pub vtype:     String,
}

impl RawSnak {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:        row.get(0)?,
      property:  row.get(1)?,
      svalue:    row.get(2)?,
      dvalue:    row.get(3)?,
      tvalue:    row.get(4)?,
      lat:       row.get(5)?,
      lng:       row.get(6)?,
      precision: row.get(7)?,
      lang:      row.get(8)?,
      vtype:     row.get(9)?,
    })
  }

  pub fn into_property_value(self) -> Result<PropertyValue> {
    let Self { id, property, svalue, dvalue, tvalue, lat, lng, precision, lang, vtype } = self;
    let missing =
      |column: &str| Error::Corrupt(format!("{vtype} snak {id} has no {column}"));

    let value = match ValueType::from_discriminant(&vtype)? {
      ValueType::Item => Value::Entity(svalue.ok_or_else(|| missing("svalue"))?),
      ValueType::String => Value::Literal(Literal {
        content:  svalue.ok_or_else(|| missing("svalue"))?,
        language: lang.unwrap_or_default(),
      }),
      ValueType::Quantity => {
        let decimal = dvalue.ok_or_else(|| missing("dvalue"))?;
        let q = Quantity::parse(&decimal)
          .map_err(|e| Error::Corrupt(format!("snak {id}: {e}")))?;
        Value::Quantity(q)
      }
      ValueType::Time => {
        let code = precision.ok_or_else(|| missing("precision"))?;
        let precision = u8::try_from(code)
          .ok()
          .and_then(|c| Precision::try_from(c).ok())
          .ok_or_else(|| Error::Corrupt(format!("snak {id}: precision {code}")))?;
        let tvalue = tvalue.ok_or_else(|| missing("tvalue"))?;
        Value::Time(decode_time(&tvalue, precision)?)
      }
      ValueType::Location => Value::Location(Location {
        latitude:  lat.ok_or_else(|| missing("lat"))?,
        longitude: lng.ok_or_else(|| missing("lng"))?,
      }),
    };

    Ok(PropertyValue { property, value })
  }
}

/// Column list matching [`RawStatement::from_row`].
pub const STATEMENT_COLUMNS: &str = "statement.id, statement.subject, statement.mainsnak, \
   statement.dataset, statement.upload, statement.state";

/// Raw values read directly from a `statement` row.
pub struct RawStatement {
  pub id:       i64,
  pub subject:  String,
  pub mainsnak: i64,
  pub dataset:  String,
  pub upload:   i64,
  pub state:    i64,
}

impl RawStatement {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:       row.get(0)?,
      subject:  row.get(1)?,
      mainsnak: row.get(2)?,
      dataset:  row.get(3)?,
      upload:   row.get(4)?,
      state:    row.get(5)?,
    })
  }

  pub fn into_statement(
    self,
    property_value: PropertyValue,
    qualifiers: Vec<PropertyValue>,
    sources: Vec<PropertyValue>,
    activities: Vec<LogEntry>,
  ) -> Result<Statement> {
    Ok(Statement {
      id: self.id,
      qid: self.subject,
      property_value,
      qualifiers,
      sources,
      dataset: self.dataset,
      upload: self.upload,
      approval_state: decode_state(self.state)?,
      activities,
    })
  }
}

/// Raw values read from a `userlog` row.
pub struct RawLogEntry {
  pub user:    String,
  pub state:   i64,
  pub changed: String,
}

impl RawLogEntry {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { user: row.get(0)?, state: row.get(1)?, changed: row.get(2)? })
  }

  pub fn into_log_entry(self) -> Result<LogEntry> {
    Ok(LogEntry {
      user:    self.user,
      state:   decode_state(self.state)?,
      changed: decode_dt(&self.changed)?,
    })
  }
}

fn decode_state(code: i64) -> Result<ApprovalState> {
  ApprovalState::from_code(code).map_err(|e| Error::Corrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn coarse_times_keep_zeroed_fields() {
    let t = Time::year(1900);
    let encoded = encode_time(&t);
    assert_eq!(encoded, "1900-00-00 00:00:00");
    assert_eq!(decode_time(&encoded, Precision::Year).unwrap(), t);
  }

  #[test]
  fn malformed_time_is_rejected() {
    assert!(decode_time("1900-01", Precision::Year).is_err());
    assert!(decode_time("yesterday 12:00:00", Precision::Day).is_err());
  }

  #[test]
  fn ancient_times_cannot_be_encoded() {
    let err = ValueColumns::encode(&Value::Time(Time::year(800))).unwrap_err();
    assert!(matches!(err, Error::Core(pst_core::Error::InvalidValue(_))));
  }

  #[test]
  fn unnormalized_time_encodes_like_its_normal_form() {
    let raw = Time {
      year:      1900,
      month:     5,
      day:       3,
      hour:      0,
      minute:    0,
      second:    0,
      precision: Precision::Year,
    };
    assert_eq!(
      ValueColumns::encode(&Value::Time(raw)).unwrap(),
      ValueColumns::encode(&Value::Time(Time::year(1900))).unwrap()
    );
  }

  #[test]
  fn non_finite_locations_cannot_be_encoded() {
    let err = ValueColumns::encode(&Value::location(f64::NAN, 13.0)).unwrap_err();
    assert!(matches!(err, Error::Core(pst_core::Error::InvalidValue(_))));
  }

  #[test]
  fn literal_matcher_includes_language() {
    let cols = ValueColumns::encode(&Value::literal("Berlin", "de")).unwrap();
    let (sql, params) = cols.matcher("snak.");
    assert_eq!(sql, "snak.vtype = ? AND snak.svalue = ? AND snak.lang = ?");
    assert_eq!(params.len(), 3);
  }

  #[test]
  fn time_matcher_includes_precision() {
    let cols = ValueColumns::encode(&Value::Time(Time::date(1967, 1, 17))).unwrap();
    let (sql, _) = cols.matcher("");
    assert_eq!(sql, "vtype = ? AND tvalue = ? AND \"precision\" = ?");
  }

  #[test]
  fn timestamps_are_fixed_width() {
    let a = encode_dt(DateTime::from_timestamp(0, 0).unwrap());
    let b = encode_dt(DateTime::from_timestamp(1_700_000_000, 5_000).unwrap());
    assert_eq!(a.len(), b.len());
    assert!(a < b);
    assert_eq!(decode_dt(&b).unwrap().timestamp(), 1_700_000_000);
  }
}
