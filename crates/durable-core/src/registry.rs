//! Static registries of protected databases and merge-enabled tables.
//!
//! Both registries are built once when the manager is constructed and never
//! change afterwards. Iteration order is declaration order, which is also the
//! order in which databases are backed up.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Database entries ────────────────────────────────────────────────────────

/// One whole-database file protected by snapshotting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRegistryEntry {
  pub key:              String,
  /// Path of the live file, relative to the host application's root.
  pub source_path:      PathBuf,
  pub description:      String,
  #[serde(default)]
  pub is_critical:      bool,
  /// Shared between dev and prod rather than environment specific.
  #[serde(default)]
  pub is_cross_cutting: bool,
}

impl BackupRegistryEntry {
  pub fn new(
    key:         impl Into<String>,
    source_path: impl Into<PathBuf>,
    description: impl Into<String>,
  ) -> Self {
    Self {
      key:              key.into(),
      source_path:      source_path.into(),
      description:      description.into(),
      is_critical:      false,
      is_cross_cutting: false,
    }
  }

  pub fn critical(mut self) -> Self {
    self.is_critical = true;
    self
  }

  pub fn cross_cutting(mut self) -> Self {
    self.is_cross_cutting = true;
    self
  }
}

/// The databases Pipulate protects out of the box.
pub fn default_databases() -> Vec<BackupRegistryEntry> {
  vec![
    BackupRegistryEntry::new(
      "ai_keychain",
      "data/ai_keychain.db",
      "AI keychain (persistent assistant memory)",
    )
    .critical()
    .cross_cutting(),
    BackupRegistryEntry::new(
      "discussion",
      "data/discussion.db",
      "Conversation history",
    )
    .critical()
    .cross_cutting(),
    BackupRegistryEntry::new(
      "app_prod",
      "data/botifython.db",
      "Production profiles and tasks",
    )
    .critical(),
    BackupRegistryEntry::new(
      "app_dev",
      "data/botifython_dev.db",
      "Development profiles and tasks",
    ),
  ]
}

/// Ordered, key-unique list of [`BackupRegistryEntry`].
#[derive(Debug, Clone)]
pub struct DatabaseRegistry {
  entries: Vec<BackupRegistryEntry>,
}

impl DatabaseRegistry {
  pub fn new(entries: Vec<BackupRegistryEntry>) -> Result<Self> {
    for (i, entry) in entries.iter().enumerate() {
      if entry.key.trim().is_empty() {
        return Err(Error::EmptyKey);
      }
      if entries[..i].iter().any(|e| e.key == entry.key) {
        return Err(Error::DuplicateKey(entry.key.clone()));
      }
    }
    Ok(Self { entries })
  }

  pub fn get(&self, key: &str) -> Option<&BackupRegistryEntry> {
    self.entries.iter().find(|e| e.key == key)
  }

  pub fn iter(&self) -> impl Iterator<Item = &BackupRegistryEntry> {
    self.entries.iter()
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

// ─── Table entries ───────────────────────────────────────────────────────────

/// Row-level merge settings for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBackupConfig {
  pub table_name:        String,
  #[serde(default = "default_primary_key")]
  pub primary_key_field: String,
  #[serde(default = "default_timestamp")]
  pub timestamp_field:   String,
  #[serde(default = "default_soft_delete")]
  pub soft_delete_field: String,
}

fn default_primary_key() -> String { "id".into() }
fn default_timestamp() -> String { "updated_at".into() }
fn default_soft_delete() -> String { "deleted_at".into() }

impl TableBackupConfig {
  /// A table keyed by `id` with `updated_at` / `deleted_at` metadata.
  pub fn new(table_name: impl Into<String>) -> Self {
    Self {
      table_name:        table_name.into(),
      primary_key_field: default_primary_key(),
      timestamp_field:   default_timestamp(),
      soft_delete_field: default_soft_delete(),
    }
  }

  /// The two metadata columns merge depends on, in the order they are added.
  pub fn merge_fields(&self) -> [&str; 2] {
    [&self.timestamp_field, &self.soft_delete_field]
  }
}

pub fn default_tables() -> Vec<TableBackupConfig> {
  vec![TableBackupConfig::new("profile"), TableBackupConfig::new("tasks")]
}

/// Ordered, name-unique list of [`TableBackupConfig`].
#[derive(Debug, Clone)]
pub struct TableRegistry {
  tables: Vec<TableBackupConfig>,
}

impl TableRegistry {
  pub fn new(tables: Vec<TableBackupConfig>) -> Result<Self> {
    for (i, table) in tables.iter().enumerate() {
      if table.table_name.trim().is_empty() {
        return Err(Error::EmptyKey);
      }
      if tables[..i].iter().any(|t| t.table_name == table.table_name) {
        return Err(Error::DuplicateTable(table.table_name.clone()));
      }
    }
    Ok(Self { tables })
  }

  pub fn get(&self, table_name: &str) -> Option<&TableBackupConfig> {
    self.tables.iter().find(|t| t.table_name == table_name)
  }

  pub fn iter(&self) -> impl Iterator<Item = &TableBackupConfig> {
    self.tables.iter()
  }

  pub fn len(&self) -> usize { self.tables.len() }

  pub fn is_empty(&self) -> bool { self.tables.is_empty() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_registry_is_valid_and_ordered() {
    let registry = DatabaseRegistry::new(default_databases()).unwrap();
    let keys: Vec<_> = registry.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, ["ai_keychain", "discussion", "app_prod", "app_dev"]);
    assert!(registry.get("ai_keychain").unwrap().is_cross_cutting);
    assert!(!registry.get("app_dev").unwrap().is_critical);
  }

  #[test]
  fn duplicate_database_key_rejected() {
    let entries = vec![
      BackupRegistryEntry::new("a", "a.db", "first"),
      BackupRegistryEntry::new("a", "b.db", "second"),
    ];
    assert!(matches!(
      DatabaseRegistry::new(entries),
      Err(Error::DuplicateKey(k)) if k == "a"
    ));
  }

  #[test]
  fn empty_table_name_rejected() {
    let tables = vec![TableBackupConfig::new("  ")];
    assert!(matches!(TableRegistry::new(tables), Err(Error::EmptyKey)));
  }

  #[test]
  fn table_config_defaults_from_partial_toml_shape() {
    let cfg: TableBackupConfig =
      serde_json::from_str(r#"{ "table_name": "profile" }"#).unwrap();
    assert_eq!(cfg, TableBackupConfig::new("profile"));
    assert_eq!(cfg.merge_fields(), ["updated_at", "deleted_at"]);
  }
}
