//! Canonical timestamps for merge conflict resolution.
//!
//! Writers should emit RFC 3339 UTC (see [`now`]). For compatibility with
//! rows written before that convention, naive ISO-8601 values without an
//! offset are accepted and read as UTC. Values are compared as instants,
//! never as raw strings.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::{Error, Result};

const NAIVE_FORMATS: &[&str] = &[
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M:%S%.f",
];

/// Parse a stored timestamp.
pub fn parse(s: &str) -> Result<DateTime<Utc>> {
  let s = s.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }
  NAIVE_FORMATS
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    .map(|naive| naive.and_utc())
    .ok_or_else(|| Error::InvalidTimestamp(s.to_owned()))
}

/// Parse an optional column value; `None` stays `None`.
pub fn parse_opt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(parse).transpose()
}

/// The canonical encoding of `dt`.
pub fn encode(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// The current instant in canonical encoding.
pub fn now() -> String { encode(Utc::now()) }

/// Order two optional timestamps. A missing value sorts first.
pub fn compare(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
  a.cmp(&b)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_rfc3339_and_naive_forms() {
    let a = parse("2024-01-02T00:00:00Z").unwrap();
    let b = parse("2024-01-02T00:00:00").unwrap();
    let c = parse("2024-01-02 00:00:00.000").unwrap();
    let d = parse("2024-01-02T01:00:00+01:00").unwrap();
    assert_eq!(a, b);
    assert_eq!(a, c);
    assert_eq!(a, d);
  }

  #[test]
  fn rejects_garbage() {
    assert!(matches!(parse("yesterday"), Err(Error::InvalidTimestamp(_))));
    assert!(parse("2024-01-02").is_err());
  }

  #[test]
  fn compares_instants_not_strings() {
    // Lexically "2024-01-02T00:30:00+01:00" > "2024-01-01T23:45:00Z",
    // but it is the earlier instant.
    let a = parse_opt(Some("2024-01-02T00:30:00+01:00")).unwrap();
    let b = parse_opt(Some("2024-01-01T23:45:00Z")).unwrap();
    assert_eq!(compare(a, b), Ordering::Less);
  }

  #[test]
  fn missing_sorts_first() {
    let a = parse_opt(Some("1970-01-01T00:00:00Z")).unwrap();
    assert_eq!(compare(None, a), Ordering::Less);
    assert_eq!(compare(None, None), Ordering::Equal);
  }

  #[test]
  fn encoded_now_parses_back() {
    assert!(parse(&now()).is_ok());
  }
}
