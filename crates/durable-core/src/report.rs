//! Result and status types returned to the host application.

use std::{fmt, path::PathBuf};

use serde::Serialize;

use crate::Result;

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Per-item success flags, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Outcome {
  entries: Vec<(String, bool)>,
}

impl Outcome {
  pub fn new() -> Self { Self::default() }

  pub fn record(&mut self, key: impl Into<String>, ok: bool) {
    self.entries.push((key.into(), ok));
  }

  pub fn get(&self, key: &str) -> Option<bool> {
    self.entries.iter().find(|(k, _)| k == key).map(|(_, ok)| *ok)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
    self.entries.iter().map(|(k, ok)| (k.as_str(), *ok))
  }

  pub fn succeeded(&self) -> usize {
    self.entries.iter().filter(|(_, ok)| *ok).count()
  }

  pub fn total(&self) -> usize { self.entries.len() }

  pub fn all_succeeded(&self) -> bool { self.succeeded() == self.total() }
}

impl fmt::Display for Outcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.succeeded(), self.total())
  }
}

// ─── Merge ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
  /// Row-level last-writer-wins on the timestamp column.
  Timestamp,
  /// Destination emptied and refilled from the source.
  Replace,
}

/// What a single merge call changed in its destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
  pub strategy:  MergeStrategy,
  pub inserted:  usize,
  pub updated:   usize,
  pub unchanged: usize,
  /// Rows skipped because a timestamp on either side was malformed.
  pub rejected:  usize,
}

impl MergeReport {
  pub fn new(strategy: MergeStrategy) -> Self {
    Self { strategy, inserted: 0, updated: 0, unchanged: 0, rejected: 0 }
  }

  /// Number of rows written to the destination.
  pub fn writes(&self) -> usize { self.inserted + self.updated }
}

// ─── Status summary ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactStatus {
  Present { size_bytes: u64 },
  Missing,
}

/// Backup state of one registered database.
#[derive(Debug, Clone, Serialize)]
pub struct BackupStatusRow {
  pub key:              String,
  pub description:      String,
  pub is_critical:      bool,
  pub is_cross_cutting: bool,
  pub status:           ArtifactStatus,
  pub backup_path:      PathBuf,
  /// Whether the latest artifact matches the live file; `None` when either
  /// side is absent.
  pub in_sync:          Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupSummary {
  pub backup_root: PathBuf,
  pub rows:        Vec<BackupStatusRow>,
}

impl BackupSummary {
  pub fn present(&self) -> usize {
    self
      .rows
      .iter()
      .filter(|r| matches!(r.status, ArtifactStatus::Present { .. }))
      .count()
  }

  pub fn missing_critical(&self) -> impl Iterator<Item = &BackupStatusRow> {
    self
      .rows
      .iter()
      .filter(|r| r.is_critical && r.status == ArtifactStatus::Missing)
  }

  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }
}

fn human_size(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
  let mut value = bytes as f64;
  let mut unit = 0;
  while value >= 1024.0 && unit < UNITS.len() - 1 {
    value /= 1024.0;
    unit += 1;
  }
  if unit == 0 {
    format!("{bytes} B")
  } else {
    format!("{value:.1} {}", UNITS[unit])
  }
}

impl fmt::Display for BackupSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let cells: Vec<[String; 4]> = self
      .rows
      .iter()
      .map(|row| {
        let mut description = row.description.clone();
        if row.is_critical {
          description.push_str(" *");
        }
        let status = match (&row.status, row.in_sync) {
          (ArtifactStatus::Present { size_bytes }, Some(false)) => {
            format!("{} (stale)", human_size(*size_bytes))
          }
          (ArtifactStatus::Present { size_bytes }, _) => human_size(*size_bytes),
          (ArtifactStatus::Missing, _) => "missing".to_owned(),
        };
        [
          row.key.clone(),
          description,
          status,
          row.backup_path.display().to_string(),
        ]
      })
      .collect();

    let header = ["KEY", "DATABASE", "BACKUP", "PATH"];
    let mut widths = header.map(str::len);
    for row in &cells {
      for (w, cell) in widths.iter_mut().zip(row) {
        *w = (*w).max(cell.chars().count());
      }
    }

    writeln!(f, "Backups in {}", self.backup_root.display())?;
    let line = |f: &mut fmt::Formatter<'_>, cols: [&str; 4]| {
      writeln!(
        f,
        "{:<w0$}  {:<w1$}  {:<w2$}  {}",
        cols[0],
        cols[1],
        cols[2],
        cols[3],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
      )
    };
    line(f, header)?;
    for row in &cells {
      line(f, [row[0].as_str(), row[1].as_str(), row[2].as_str(), row[3].as_str()])?;
    }
    write!(f, "{}/{} backed up (* critical)", self.present(), self.rows.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn row(key: &str, critical: bool, status: ArtifactStatus) -> BackupStatusRow {
    BackupStatusRow {
      key: key.into(),
      description: format!("{key} db"),
      is_critical: critical,
      is_cross_cutting: false,
      status,
      backup_path: PathBuf::from(format!("/b/{key}.db")),
      in_sync: None,
    }
  }

  #[test]
  fn outcome_counts_in_order() {
    let mut out = Outcome::new();
    out.record("a", true);
    out.record("b", false);
    out.record("c", true);
    assert_eq!(out.to_string(), "2/3");
    assert_eq!(out.get("b"), Some(false));
    assert!(!out.all_succeeded());
    let keys: Vec<_> = out.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, ["a", "b", "c"]);
  }

  #[test]
  fn summary_renders_every_row() {
    let summary = BackupSummary {
      backup_root: PathBuf::from("/b"),
      rows: vec![
        row("app_prod", true, ArtifactStatus::Present { size_bytes: 2048 }),
        row("discussion", true, ArtifactStatus::Missing),
      ],
    };
    let text = summary.to_string();
    assert!(text.contains("app_prod"));
    assert!(text.contains("2.0 KB"));
    assert!(text.contains("missing"));
    assert!(text.ends_with("1/2 backed up (* critical)"));
    assert_eq!(summary.missing_critical().count(), 1);
  }

  #[test]
  fn summary_serialises_status_tag() {
    let summary = BackupSummary {
      backup_root: PathBuf::from("/b"),
      rows: vec![row("x", false, ArtifactStatus::Present { size_bytes: 1 })],
    };
    let json: serde_json::Value =
      serde_json::from_str(&summary.to_json().unwrap()).unwrap();
    assert_eq!(json["rows"][0]["status"]["status"], "present");
    assert_eq!(json["rows"][0]["status"]["size_bytes"], 1);
  }
}
