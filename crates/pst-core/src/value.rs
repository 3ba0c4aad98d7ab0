//! Typed values and snaks: the atomic, content-addressable fact units.
//!
//! A [`Value`] is a true sum type: exactly one variant is ever populated, so
//! invalid field combinations cannot be represented. Equality is derived and
//! therefore variant-specific; values of different variants are never equal.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};

use crate::{Error, Result};

/// Earliest year a [`Time`] may carry when it is written to storage.
pub const MIN_YEAR: i32 = 1000;

/// Latest year a [`Time`] may carry when it is written to storage.
pub const MAX_YEAR: i32 = 9999;

// ─── Literal ─────────────────────────────────────────────────────────────────

/// A text value. `language` is empty for untagged strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Literal {
  pub content:  String,
  pub language: String,
}

// ─── Quantity ────────────────────────────────────────────────────────────────

/// An arbitrary-precision signed decimal, held in canonical string form.
///
/// The canonical form always carries an explicit sign, has no leading zeros
/// in the integer part, and no trailing zeros (or dangling `.`) in the
/// fractional part. Two quantities are equal iff their canonical strings are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quantity {
  decimal: String,
}

impl Quantity {
  pub fn parse(s: &str) -> Result<Self> {
    canonical_decimal(s)
      .map(|decimal| Self { decimal })
      .ok_or_else(|| Error::InvalidValue(format!("not a decimal: {s:?}")))
  }

  pub fn as_str(&self) -> &str { &self.decimal }
}

impl FromStr for Quantity {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl TryFrom<String> for Quantity {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { Self::parse(&s) }
}

impl From<Quantity> for String {
  fn from(q: Quantity) -> Self { q.decimal }
}

impl fmt::Display for Quantity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.decimal)
  }
}

fn canonical_decimal(input: &str) -> Option<String> {
  let s = input.trim();
  let (negative, digits) = match s.as_bytes().first()? {
    b'+' => (false, &s[1..]),
    b'-' => (true, &s[1..]),
    _ => (false, s),
  };

  let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
  if int_part.is_empty() && frac_part.is_empty() {
    return None;
  }
  let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
  if !all_digits(int_part) || !all_digits(frac_part) {
    return None;
  }

  let int_part = match int_part.trim_start_matches('0') {
    "" => "0",
    trimmed => trimmed,
  };
  let frac_part = frac_part.trim_end_matches('0');

  // -0 and +0 are the same quantity
  let is_zero = int_part == "0" && frac_part.is_empty();
  let sign = if negative && !is_zero { '-' } else { '+' };

  let mut out = format!("{sign}{int_part}");
  if !frac_part.is_empty() {
    out.push('.');
    out.push_str(frac_part);
  }
  Some(out)
}

// ─── Time ────────────────────────────────────────────────────────────────────

/// Wikidata time precision codes.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Precision {
  BillionYears = 0,
  HundredMillionYears = 1,
  TenMillionYears = 2,
  MillionYears = 3,
  HundredThousandYears = 4,
  TenThousandYears = 5,
  Millennium = 6,
  Century = 7,
  Decade = 8,
  Year = 9,
  Month = 10,
  Day = 11,
  Hour = 12,
  Minute = 13,
  Second = 14,
}

impl Precision {
  pub fn code(self) -> u8 { self as u8 }
}

impl TryFrom<u8> for Precision {
  type Error = Error;

  fn try_from(code: u8) -> Result<Self> {
    Ok(match code {
      0 => Self::BillionYears,
      1 => Self::HundredMillionYears,
      2 => Self::TenMillionYears,
      3 => Self::MillionYears,
      4 => Self::HundredThousandYears,
      5 => Self::TenThousandYears,
      6 => Self::Millennium,
      7 => Self::Century,
      8 => Self::Decade,
      9 => Self::Year,
      10 => Self::Month,
      11 => Self::Day,
      12 => Self::Hour,
      13 => Self::Minute,
      14 => Self::Second,
      other => {
        return Err(Error::InvalidValue(format!("time precision {other}")));
      }
    })
  }
}

impl From<Precision> for u8 {
  fn from(p: Precision) -> Self { p.code() }
}

/// A calendar time with a precision code. Fields finer than the precision are
/// always zero, including after deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "TimeFields")]
pub struct Time {
  pub year:      i32,
  pub month:     u8,
  pub day:       u8,
  pub hour:      u8,
  pub minute:    u8,
  pub second:    u8,
  pub precision: Precision,
}

/// Wire form of [`Time`], normalized on the way in.
#[derive(Deserialize)]
struct TimeFields {
  year:      i32,
  #[serde(default)]
  month:     u8,
  #[serde(default)]
  day:       u8,
  #[serde(default)]
  hour:      u8,
  #[serde(default)]
  minute:    u8,
  #[serde(default)]
  second:    u8,
  precision: Precision,
}

impl From<TimeFields> for Time {
  fn from(f: TimeFields) -> Self {
    Self::new(f.year, f.month, f.day, f.hour, f.minute, f.second, f.precision)
  }
}

impl Time {
  /// Build a time, zeroing every field finer than `precision`.
  pub fn new(
    year: i32,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    precision: Precision,
  ) -> Self {
    Self { year, month, day, hour, minute, second, precision }.normalized()
  }

  /// A time known only to the year.
  pub fn year(year: i32) -> Self { Self::new(year, 0, 0, 0, 0, 0, Precision::Year) }

  /// A time known to the day.
  pub fn date(year: i32, month: u8, day: u8) -> Self {
    Self::new(year, month, day, 0, 0, 0, Precision::Day)
  }

  pub fn normalized(mut self) -> Self {
    let p = self.precision;
    if p <= Precision::Year {
      self.month = 0;
    }
    if p <= Precision::Month {
      self.day = 0;
    }
    if p <= Precision::Day {
      self.hour = 0;
    }
    if p <= Precision::Hour {
      self.minute = 0;
    }
    if p <= Precision::Minute {
      self.second = 0;
    }
    self
  }

  /// Reject times the store cannot represent.
  pub fn validate(&self) -> Result<()> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&self.year) {
      return Err(Error::InvalidValue(format!(
        "year {} outside supported range {MIN_YEAR}..={MAX_YEAR}",
        self.year
      )));
    }
    if self.month > 12 || self.day > 31 || self.hour > 23 || self.minute > 59 || self.second > 59 {
      return Err(Error::InvalidValue(format!("time out of range: {self}")));
    }
    if (self.precision >= Precision::Month && self.month == 0)
      || (self.precision >= Precision::Day && self.day == 0)
    {
      return Err(Error::InvalidValue(format!("time missing month or day: {self}")));
    }
    Ok(())
  }

  /// The QuickStatements form, e.g. `+1967-01-17T00:00:00Z/11`.
  pub fn to_wikidata_string(&self) -> String {
    format!(
      "+{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z/{}",
      self.year,
      self.month,
      self.day,
      self.hour,
      self.minute,
      self.second,
      self.precision.code()
    )
  }
}

impl fmt::Display for Time {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_wikidata_string())
  }
}

// ─── Location ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
  pub latitude:  f64,
  pub longitude: f64,
}

impl Location {
  /// Reject non-finite or out-of-range coordinates.
  pub fn validate(&self) -> Result<()> {
    let Self { latitude, longitude } = *self;
    if !latitude.is_finite() || !longitude.is_finite() {
      return Err(Error::InvalidValue(format!("non-finite location ({latitude}, {longitude})")));
    }
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
      return Err(Error::InvalidValue(format!(
        "location ({latitude}, {longitude}) out of range"
      )));
    }
    Ok(())
  }
}

// ─── Value ───────────────────────────────────────────────────────────────────

/// The discriminant of a [`Value`], as stored in the `vtype` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ValueType {
  Item,
  String,
  Quantity,
  Time,
  Location,
}

impl ValueType {
  pub fn discriminant(self) -> &'static str { self.into() }

  pub fn from_discriminant(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownValueType(s.to_owned()))
  }
}

/// The typed object of a snak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Value {
  /// Reference to another subject by QID.
  Entity(String),
  Literal(Literal),
  Quantity(Quantity),
  Time(Time),
  Location(Location),
}

impl Value {
  pub fn entity(qid: impl Into<String>) -> Self { Self::Entity(qid.into()) }

  pub fn literal(content: impl Into<String>, language: impl Into<String>) -> Self {
    Self::Literal(Literal { content: content.into(), language: language.into() })
  }

  /// Parse and canonicalise a decimal quantity.
  pub fn quantity(decimal: &str) -> Result<Self> {
    Ok(Self::Quantity(Quantity::parse(decimal)?))
  }

  pub fn location(latitude: f64, longitude: f64) -> Self {
    Self::Location(Location { latitude, longitude })
  }

  pub fn value_type(&self) -> ValueType {
    match self {
      Self::Entity(_) => ValueType::Item,
      Self::Literal(_) => ValueType::String,
      Self::Quantity(_) => ValueType::Quantity,
      Self::Time(_) => ValueType::Time,
      Self::Location(_) => ValueType::Location,
    }
  }
}

impl From<Time> for Value {
  fn from(t: Time) -> Self { Self::Time(t) }
}

impl From<Quantity> for Value {
  fn from(q: Quantity) -> Self { Self::Quantity(q) }
}

// ─── PropertyValue ───────────────────────────────────────────────────────────

/// A snak: a property paired with a typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
  pub property: String,
  pub value:    Value,
}

impl PropertyValue {
  pub fn new(property: impl Into<String>, value: Value) -> Self {
    Self { property: property.into(), value }
  }
}
