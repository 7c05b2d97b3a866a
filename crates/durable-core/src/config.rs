//! Runtime configuration for the backup manager.
//!
//! Every field has a default, so an empty config file (or none at all)
//! yields Pipulate's stock setup.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::registry::{
  BackupRegistryEntry, TableBackupConfig, default_databases, default_tables,
};

/// How a whole-database artifact is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotMethod {
  /// Byte-for-byte file copy.
  #[default]
  FileCopy,
  /// SQLite online backup API; consistent even while another connection
  /// is writing.
  OnlineBackup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
  /// Backups live under `~/.{app_namespace}/backups`.
  pub app_namespace:   String,
  /// Explicit backup root; bypasses the home-directory location.
  pub backup_root:     Option<PathBuf>,
  /// Directory registry `source_path`s are relative to.
  pub app_root:        PathBuf,
  pub retention_days:  u32,
  pub snapshot_method: SnapshotMethod,
  pub databases:       Vec<BackupRegistryEntry>,
  /// Registry key of the database holding the merge-enabled tables. Table
  /// backups merge into its dated artifact and restores read from it.
  pub main_database:   String,
  pub tables:          Vec<TableBackupConfig>,
}

pub const DEFAULT_RETENTION_DAYS: u32 = 7;
pub const DEFAULT_MAIN_DATABASE: &str = "app_prod";

impl Default for BackupConfig {
  fn default() -> Self {
    Self {
      app_namespace:   "pipulate".into(),
      backup_root:     None,
      app_root:        PathBuf::from("."),
      retention_days:  DEFAULT_RETENTION_DAYS,
      snapshot_method: SnapshotMethod::default(),
      databases:       default_databases(),
      main_database:   DEFAULT_MAIN_DATABASE.into(),
      tables:          default_tables(),
    }
  }
}

impl BackupConfig {
  /// Default configuration with every artifact written to `backup_root`.
  pub fn with_backup_root(backup_root: impl Into<PathBuf>) -> Self {
    Self { backup_root: Some(backup_root.into()), ..Self::default() }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_config_keeps_defaults() {
    let cfg: BackupConfig = serde_json::from_str(
      r#"{ "retention_days": 3, "snapshot_method": "online_backup" }"#,
    )
    .unwrap();
    assert_eq!(cfg.retention_days, 3);
    assert_eq!(cfg.snapshot_method, SnapshotMethod::OnlineBackup);
    assert_eq!(cfg.app_namespace, "pipulate");
    assert_eq!(cfg.databases.len(), 4);
    assert_eq!(cfg.tables.len(), 2);
    assert_eq!(cfg.main_database, "app_prod");
  }
}
