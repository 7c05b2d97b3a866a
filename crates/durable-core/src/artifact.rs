//! Backup artifact naming.
//!
//! A *latest* artifact keeps the live file's name and is overwritten on every
//! snapshot. A *dated* artifact inserts `_YYYY-MM-DD` between the file stem
//! and its extension: `botifython.db` becomes `botifython_2024-01-02.db`.

use std::path::Path;

use chrono::NaiveDate;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Split a file name into `(stem, suffix)` where the suffix keeps its dot.
///
/// Only the last extension counts, so `a.tar.gz` splits into `("a.tar", ".gz")`.
pub fn split_file_name(file_name: &str) -> (&str, &str) {
  let path = Path::new(file_name);
  match (path.file_stem().and_then(|s| s.to_str()), path.extension()) {
    (Some(stem), Some(_)) => (stem, &file_name[stem.len()..]),
    _ => (file_name, ""),
  }
}

/// Name of the dated artifact for `file_name` on `date`.
pub fn dated_file_name(file_name: &str, date: NaiveDate) -> String {
  let (stem, suffix) = split_file_name(file_name);
  format!("{stem}_{}{suffix}", date.format(DATE_FORMAT))
}

/// A file name recognised as a dated artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedArtifact {
  /// The stem without the date, e.g. `botifython`.
  pub stem:   String,
  pub date:   NaiveDate,
  pub suffix: String,
}

impl DatedArtifact {
  /// Parse `{stem}_{YYYY-MM-DD}{suffix}`.
  ///
  /// Returns `None` for anything else, including latest artifacts and names
  /// whose date component does not form a real calendar date.
  pub fn parse(file_name: &str) -> Option<Self> {
    let (dated_stem, suffix) = split_file_name(file_name);
    let (stem, date) = dated_stem.rsplit_once('_')?;
    if stem.is_empty() || date.len() != 10 {
      return None;
    }
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
    Some(Self { stem: stem.to_owned(), date, suffix: suffix.to_owned() })
  }

  /// Whether this artifact belongs to the series of `stem` + `suffix`.
  pub fn is_series(&self, stem: &str, suffix: &str) -> bool {
    self.stem == stem && self.suffix == suffix
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn dated_name_inserts_date_before_suffix() {
    assert_eq!(
      dated_file_name("botifython.db", date(2024, 1, 2)),
      "botifython_2024-01-02.db"
    );
    assert_eq!(dated_file_name("notes", date(2024, 1, 2)), "notes_2024-01-02");
  }

  #[test]
  fn parse_recognises_dated_names() {
    let parsed = DatedArtifact::parse("ai_keychain_2024-03-09.db").unwrap();
    assert_eq!(parsed.stem, "ai_keychain");
    assert_eq!(parsed.date, date(2024, 3, 9));
    assert_eq!(parsed.suffix, ".db");
    assert!(parsed.is_series("ai_keychain", ".db"));
  }

  #[test]
  fn parse_rejects_latest_and_malformed_names() {
    assert_eq!(DatedArtifact::parse("ai_keychain.db"), None);
    assert_eq!(DatedArtifact::parse("botifython_dev.db"), None);
    assert_eq!(DatedArtifact::parse("x_2024-13-01.db"), None);
    assert_eq!(DatedArtifact::parse("x_2024-02-30.db"), None);
    assert_eq!(DatedArtifact::parse("_2024-01-01.db"), None);
    assert_eq!(DatedArtifact::parse("x_2024-1-1.db"), None);
  }

  #[test]
  fn dated_name_round_trips_through_parse() {
    let name = dated_file_name("botifython_dev.db", date(2024, 1, 2));
    let parsed = DatedArtifact::parse(&name).unwrap();
    assert!(parsed.is_series("botifython_dev", ".db"));
    assert!(!parsed.is_series("botifython", ".db"));
  }
}
