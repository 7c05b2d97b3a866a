//! Row counts and backup status, derived from files on disk.

use std::{
  fs::{self, File},
  io,
  path::Path,
};

use durable_core::{
  registry::BackupRegistryEntry,
  report::{ArtifactStatus, BackupStatusRow},
};
use sha2::{Digest, Sha256};

use crate::{
  Error, Result,
  snapshot::file_name,
  sql::{count_rows, open_read_only},
};

/// Row count of `table` in the database at `db_path`, opened read-only.
pub fn count_table(db_path: &Path, table: &str) -> Result<u64> {
  if !db_path.is_file() {
    return Err(Error::SourceMissing(db_path.to_path_buf()));
  }
  let conn = open_read_only(db_path)?;
  count_rows(&conn, table)
}

/// Hex-encoded SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> Result<String> {
  let mut hasher = Sha256::new();
  io::copy(&mut File::open(path)?, &mut hasher)?;
  Ok(hex::encode(hasher.finalize()))
}

/// Status of `entry`, whose live file is `source`.
pub fn status_row(
  entry:       &BackupRegistryEntry,
  source:      &Path,
  backup_root: &Path,
) -> Result<BackupStatusRow> {
  let backup_path = backup_root.join(file_name(&entry.source_path)?);

  let (status, in_sync) = match fs::metadata(&backup_path) {
    Ok(meta) => {
      let in_sync = if source.is_file() {
        Some(sha256_file(source)? == sha256_file(&backup_path)?)
      } else {
        None
      };
      (ArtifactStatus::Present { size_bytes: meta.len() }, in_sync)
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => (ArtifactStatus::Missing, None),
    Err(e) => return Err(e.into()),
  };

  Ok(BackupStatusRow {
    key: entry.key.clone(),
    description: entry.description.clone(),
    is_critical: entry.is_critical,
    is_cross_cutting: entry.is_cross_cutting,
    status,
    backup_path,
    in_sync,
  })
}
