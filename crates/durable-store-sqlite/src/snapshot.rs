//! Whole-database snapshots.
//!
//! Each snapshot refreshes the *latest* artifact and, once per calendar day,
//! writes a *dated* artifact. Artifacts are written to a hidden temporary
//! sibling first and renamed into place.

use std::{
  fs,
  path::{Path, PathBuf},
  time::Duration,
};

use chrono::NaiveDate;
use durable_core::{artifact::dated_file_name, config::SnapshotMethod};
use rusqlite::{Connection, backup::Backup};
use tracing::debug;
use uuid::Uuid;

use crate::{Error, Result, sql::open_read_only};

/// Paths written by [`snapshot_file`].
#[derive(Debug, Clone)]
pub struct Snapshot {
  pub latest:        PathBuf,
  pub dated:         PathBuf,
  /// False when today's dated artifact already existed.
  pub dated_created: bool,
}

pub fn file_name(path: &Path) -> Result<&str> {
  path
    .file_name()
    .and_then(|n| n.to_str())
    .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))
}

pub fn snapshot_file(
  source:      &Path,
  backup_root: &Path,
  today:       NaiveDate,
  method:      SnapshotMethod,
) -> Result<Snapshot> {
  if !source.is_file() {
    return Err(Error::SourceMissing(source.to_path_buf()));
  }
  let name = file_name(source)?;

  let latest = backup_root.join(name);
  write_artifact(source, &latest, method)?;

  let dated = backup_root.join(dated_file_name(name, today));
  let dated_created = if dated.exists() {
    debug!(path = %dated.display(), "dated artifact already exists");
    false
  } else {
    write_artifact(source, &dated, method)?;
    true
  };

  Ok(Snapshot { latest, dated, dated_created })
}

/// Copy `source` over `dest` via a temporary file in the same directory.
pub fn write_artifact(source: &Path, dest: &Path, method: SnapshotMethod) -> Result<()> {
  let tmp = dest.with_file_name(format!(".{}.{}.tmp", file_name(dest)?, Uuid::new_v4().simple()));

  let written = match method {
    SnapshotMethod::FileCopy => fs::copy(source, &tmp).map(drop).map_err(Error::from),
    SnapshotMethod::OnlineBackup => online_backup(source, &tmp),
  };
  let result = written.and_then(|()| fs::rename(&tmp, dest).map_err(Error::from));

  if result.is_err() {
    let _ = fs::remove_file(&tmp);
  }
  result
}

/// Page-level copy through SQLite's online backup API.
fn online_backup(source: &Path, dest: &Path) -> Result<()> {
  let src = open_read_only(source)?;
  let mut dst = Connection::open(dest)?;
  {
    let backup = Backup::new(&src, &mut dst)?;
    backup.run_to_completion(256, Duration::from_millis(5), None)?;
  }
  Ok(())
}
