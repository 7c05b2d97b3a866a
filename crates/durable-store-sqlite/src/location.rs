//! Backup root resolution.
//!
//! The root must survive the host application's install directory being
//! deleted, so by default it lives under the user's home:
//! `~/.{app_namespace}/backups`.

use std::{
  fs,
  path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{Error, Result};

/// Resolve and create the backup root.
///
/// An explicit `override_path` is used as-is. Calling this repeatedly returns
/// the same path and leaves an existing directory untouched.
pub fn resolve_backup_root(
  override_path: Option<&Path>,
  app_namespace: &str,
) -> Result<PathBuf> {
  if let Some(path) = override_path {
    fs::create_dir_all(path)?;
    return Ok(path.to_path_buf());
  }

  let home = dirs::home_dir().ok_or(Error::NoHomeDirectory)?;
  resolve_under_home(&home, app_namespace)
}

/// Resolve `{home}/.{app_namespace}/backups`, following symlinks in `home`.
///
/// A freshly created root is restricted to its owner. Failing to restrict it
/// is logged and otherwise ignored.
pub fn resolve_under_home(home: &Path, app_namespace: &str) -> Result<PathBuf> {
  let home = fs::canonicalize(home).unwrap_or_else(|_| home.to_path_buf());
  let root = home.join(format!(".{app_namespace}")).join("backups");

  let fresh = !root.exists();
  fs::create_dir_all(&root)?;
  if fresh {
    debug!(path = %root.display(), "created backup root");
    restrict_to_owner(&root);
  }
  Ok(root)
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) {
  use std::os::unix::fs::PermissionsExt as _;

  if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o700)) {
    warn!(path = %path.display(), error = %e, "could not restrict backup root permissions");
  }
}

#[cfg(not(unix))]
fn restrict_to_owner(path: &Path) {
  warn!(path = %path.display(), "owner-only permissions are not supported on this platform");
}
