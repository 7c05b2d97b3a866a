//! Retention sweep and dated-artifact lookup.

use std::{
  collections::HashMap,
  fs,
  path::{Path, PathBuf},
};

use chrono::{Days, NaiveDate};
use durable_core::artifact::DatedArtifact;
use tracing::{info, warn};

use crate::Result;

/// Every dated artifact directly inside `backup_root`.
pub fn dated_artifacts(backup_root: &Path) -> Result<Vec<(PathBuf, DatedArtifact)>> {
  let mut found = Vec::new();
  for entry in fs::read_dir(backup_root)? {
    let entry = entry?;
    if !entry.file_type()?.is_file() {
      continue;
    }
    let name = entry.file_name();
    let Some(artifact) = name.to_str().and_then(DatedArtifact::parse) else {
      continue;
    };
    found.push((entry.path(), artifact));
  }
  Ok(found)
}

/// The newest dated artifact of the `{stem}_{date}{suffix}` series.
pub fn latest_dated_artifact(
  backup_root: &Path,
  stem:        &str,
  suffix:      &str,
) -> Result<Option<(PathBuf, NaiveDate)>> {
  Ok(
    dated_artifacts(backup_root)?
      .into_iter()
      .filter(|(_, a)| a.is_series(stem, suffix))
      .max_by_key(|(_, a)| a.date)
      .map(|(path, a)| (path, a.date)),
  )
}

/// Delete dated artifacts whose date is `keep_days` or more before `today`.
///
/// Latest artifacts are never candidates. The newest artifact of each series
/// is kept even when it is past the window. Returns the removed paths; a file
/// that cannot be removed is logged and skipped.
pub fn sweep(backup_root: &Path, keep_days: u32, today: NaiveDate) -> Result<Vec<PathBuf>> {
  let cutoff = today
    .checked_sub_days(Days::new(u64::from(keep_days)))
    .unwrap_or(NaiveDate::MIN);
  let artifacts = dated_artifacts(backup_root)?;

  let mut newest: HashMap<(&str, &str), NaiveDate> = HashMap::new();
  for (_, a) in &artifacts {
    let date = newest.entry((a.stem.as_str(), a.suffix.as_str())).or_insert(a.date);
    *date = (*date).max(a.date);
  }

  let mut removed = Vec::new();
  for (path, a) in &artifacts {
    if a.date > cutoff || newest.get(&(a.stem.as_str(), a.suffix.as_str())) == Some(&a.date) {
      continue;
    }
    match fs::remove_file(path) {
      Ok(()) => {
        info!(path = %path.display(), date = %a.date, "removed expired backup");
        removed.push(path.clone());
      }
      Err(e) => warn!(path = %path.display(), error = %e, "could not remove expired backup"),
    }
  }
  Ok(removed)
}
