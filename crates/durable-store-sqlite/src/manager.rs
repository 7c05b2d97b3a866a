//! [`DurableBackupManager`]: the public face of the backup engine.
//!
//! Every public operation catches its own errors, logs them, and reports
//! failure through its return value (`false`, an [`Outcome`] entry, or a zero
//! count). Nothing here panics or returns `Err` for disk or database
//! failures. Connections are opened per call and dropped before returning.

use std::{
  collections::BTreeMap,
  fs,
  path::{Path, PathBuf},
};

use chrono::{Days, Local, NaiveDate};
use durable_core::{
  artifact::{dated_file_name, split_file_name},
  config::{BackupConfig, SnapshotMethod},
  registry::{BackupRegistryEntry, DatabaseRegistry, TableBackupConfig, TableRegistry},
  report::{BackupSummary, MergeReport, Outcome},
};
use rusqlite::Connection;
use tracing::{error, info, warn};

use crate::{
  Error, Result, inventory, location, merge, retention, schema,
  snapshot::{self, file_name},
  sql,
};

/// Key of the registry entry restored by
/// [`DurableBackupManager::restore_ai_keychain`].
pub const AI_KEYCHAIN_KEY: &str = "ai_keychain";

pub struct DurableBackupManager {
  backup_root:     PathBuf,
  app_root:        PathBuf,
  databases:       DatabaseRegistry,
  tables:          TableRegistry,
  /// Registry key and artifact file name of the database holding the
  /// merge-enabled tables.
  main_key:        String,
  main_file:       String,
  retention_days:  u32,
  snapshot_method: SnapshotMethod,
  #[cfg(test)]
  today:           Option<NaiveDate>,
}

impl DurableBackupManager {
  /// Validate the registries and resolve (creating if needed) the backup
  /// root.
  pub fn new(config: BackupConfig) -> Result<Self> {
    let databases = DatabaseRegistry::new(config.databases)?;
    let tables = TableRegistry::new(config.tables)?;
    let main_entry = databases
      .get(&config.main_database)
      .ok_or_else(|| durable_core::Error::UnknownMainDatabase(config.main_database.clone()))?;
    let main_file = file_name(&main_entry.source_path)?.to_owned();
    let backup_root =
      location::resolve_backup_root(config.backup_root.as_deref(), &config.app_namespace)?;

    info!(
      backup_root = %backup_root.display(),
      databases = databases.len(),
      tables = tables.len(),
      main_database = %config.main_database,
      "backup manager ready"
    );

    Ok(Self {
      backup_root,
      app_root: config.app_root,
      databases,
      tables,
      main_key: config.main_database,
      main_file,
      retention_days: config.retention_days,
      snapshot_method: config.snapshot_method,
      #[cfg(test)]
      today: None,
    })
  }

  #[cfg(test)]
  pub(crate) fn with_today(mut self, today: NaiveDate) -> Self {
    self.today = Some(today);
    self
  }

  pub fn backup_root(&self) -> &Path { &self.backup_root }

  pub fn databases(&self) -> &DatabaseRegistry { &self.databases }

  pub fn tables(&self) -> &TableRegistry { &self.tables }

  /// Absolute location of a registry entry's live file.
  pub fn source_path(&self, entry: &BackupRegistryEntry) -> PathBuf {
    self.app_root.join(&entry.source_path)
  }

  #[cfg(not(test))]
  fn today(&self) -> NaiveDate { Local::now().date_naive() }

  #[cfg(test)]
  fn today(&self) -> NaiveDate {
    self.today.unwrap_or_else(|| Local::now().date_naive())
  }

  // ── Whole-database snapshots ────────────────────────────────────────────

  /// Refresh the latest artifact of `source` and write today's dated
  /// artifact if it does not exist yet.
  pub fn backup_database(&self, source: &Path) -> bool {
    match snapshot::snapshot_file(source, &self.backup_root, self.today(), self.snapshot_method) {
      Ok(snap) => {
        info!(
          source = %source.display(),
          latest = %snap.latest.display(),
          dated = %snap.dated.display(),
          dated_created = snap.dated_created,
          "backed up database"
        );
        true
      }
      Err(e) => {
        error!(source = %source.display(), error = %e, "database backup failed");
        false
      }
    }
  }

  /// Snapshot every registered database in registry order, merge the live
  /// tables of the main database into its dated artifact, then sweep expired
  /// dated artifacts.
  pub fn backup_all_databases(&self) -> Outcome {
    let mut outcome = Outcome::new();

    for entry in self.databases.iter() {
      let source = self.source_path(entry);
      if !source.is_file() {
        if entry.is_critical {
          warn!(key = %entry.key, path = %source.display(), "critical database missing, skipped");
        } else {
          warn!(key = %entry.key, path = %source.display(), "database missing, skipped");
        }
        outcome.record(&entry.key, false);
        continue;
      }
      let ok = self.backup_database(&source);
      if ok && entry.key == self.main_key {
        self.merge_live_tables(&source);
      }
      outcome.record(&entry.key, ok);
    }

    self.cleanup_old_backups(self.retention_days);

    if outcome.all_succeeded() {
      info!(result = %outcome, "databases backed up");
    } else {
      warn!(result = %outcome, "databases backed up with failures");
    }
    outcome
  }

  // ── Retention ───────────────────────────────────────────────────────────

  /// Delete dated artifacts older than `keep_days`. Returns how many were
  /// removed.
  pub fn cleanup_old_backups(&self, keep_days: u32) -> usize {
    match retention::sweep(&self.backup_root, keep_days, self.today()) {
      Ok(removed) => {
        info!(removed = removed.len(), keep_days, "retention sweep finished");
        removed.len()
      }
      Err(e) => {
        error!(error = %e, "retention sweep failed");
        0
      }
    }
  }

  // ── Table merge ─────────────────────────────────────────────────────────

  /// Add the merge columns to `table` in the database at `db_path`.
  pub fn ensure_merge_fields(&self, db_path: &Path, table: &str) -> bool {
    let result = (|| -> Result<()> {
      let config = self.table_config(table);
      let conn = open_existing(db_path)?;
      schema::ensure_merge_fields(&conn, &config)?;
      Ok(())
    })();
    log_failure(result, table, "schema migration failed")
  }

  /// Merge `table` from the database at `source_db` into the one at
  /// `backup_db`, creating the latter if needed.
  ///
  /// Registered tables get timestamp merge; anything else is replaced
  /// wholesale.
  pub fn merge_table_data(&self, source_db: &Path, backup_db: &Path, table: &str) -> bool {
    let result = self.try_merge(source_db, backup_db, table).map(drop);
    log_failure(result, table, "table merge failed")
  }

  fn try_merge(&self, source_db: &Path, dest_db: &Path, table: &str) -> Result<MergeReport> {
    let source = open_existing(source_db)?;
    let mut dest = Connection::open(dest_db)?;

    match self.tables.get(table) {
      Some(config) => {
        schema::ensure_merge_fields(&source, config)?;
        merge::merge_table(&source, &mut dest, config)
      }
      None => merge::replace_table(&source, &mut dest, table),
    }
  }

  /// Merge the live `table` into today's dated artifact of the main
  /// database.
  ///
  /// When today's artifact does not exist yet, the newest earlier one is
  /// carried forward first so rows deleted from the live table survive in
  /// the backup.
  pub fn backup_table(&self, source_db: &Path, table: &str) -> bool {
    let result = (|| -> Result<()> {
      if !source_db.is_file() {
        return Err(Error::SourceMissing(source_db.to_path_buf()));
      }
      let dest = self.backup_root.join(dated_file_name(&self.main_file, self.today()));
      if !dest.exists() {
        if let Some((previous, date)) = self.latest_main_artifact()? {
          snapshot::write_artifact(&previous, &dest, SnapshotMethod::FileCopy)?;
          info!(table, from = %date, "carried table backup forward");
        }
      }
      self.try_merge(source_db, &dest, table)?;
      Ok(())
    })();
    log_failure(result, table, "table backup failed")
  }

  /// Back up every registered table from `main_db`.
  pub fn backup_all_tables(&self, main_db: &Path) -> Outcome {
    let mut outcome = Outcome::new();
    for config in self.tables.iter() {
      outcome.record(&config.table_name, self.backup_table(main_db, &config.table_name));
    }
    info!(result = %outcome, "tables backed up");
    outcome
  }

  /// Startup counterpart of [`Self::backup_all_tables`]: tables the live
  /// database does not have yet are skipped rather than reported.
  fn merge_live_tables(&self, main_db: &Path) {
    let present = match open_existing(main_db) {
      Ok(conn) => self
        .tables
        .iter()
        .map(|config| config.table_name.as_str())
        .filter(|table| matches!(sql::table_exists(&conn, table), Ok(true)))
        .collect::<Vec<_>>(),
      Err(e) => {
        error!(path = %main_db.display(), error = %e, "could not inspect main database");
        return;
      }
    };

    for table in present {
      self.backup_table(main_db, table);
    }
  }

  /// Newest dated artifact of the main database, if any.
  fn latest_main_artifact(&self) -> Result<Option<(PathBuf, NaiveDate)>> {
    let (stem, suffix) = split_file_name(&self.main_file);
    retention::latest_dated_artifact(&self.backup_root, stem, suffix)
  }

  // ── Restore ─────────────────────────────────────────────────────────────

  /// Merge `table` from the main database's newest dated artifact into
  /// `target_db`, with the backup as the source side.
  ///
  /// Returns false, leaving the target untouched, when no backup exists or
  /// when the backed-up table has no timestamp column. Restores only ever
  /// write through the additive merge, never through a table replace.
  pub fn restore_table(&self, target_db: &Path, table: &str) -> bool {
    let result = (|| -> Result<bool> {
      let Some((backup, date)) = self.latest_main_artifact()? else {
        warn!(table, "no backup to restore from");
        return Ok(false);
      };

      let config = self.table_config(table);
      let source = sql::open_read_only(&backup)?;
      let capability = schema::capability(&source, &config)?;
      if !capability.can_merge(&config) {
        warn!(table, from = %date, ?capability, "backup has no timestamp column, not restoring");
        return Ok(false);
      }

      let mut target = Connection::open(target_db)?;
      if sql::table_exists(&target, table)? {
        schema::ensure_merge_fields(&target, &config)?;
      }
      let report = merge::merge_table(&source, &mut target, &config)?;
      info!(table, from = %date, restored = report.writes(), "restored table");
      Ok(true)
    })();

    match result {
      Ok(restored) => restored,
      Err(e) => {
        error!(table, error = %e, "table restore failed");
        false
      }
    }
  }

  /// Copy the keychain's dated backup over `target_path`.
  ///
  /// Today's artifact is preferred; yesterday's covers a restart just after
  /// midnight.
  pub fn restore_ai_keychain(&self, target_path: &Path) -> bool {
    let result = (|| -> Result<bool> {
      let Some(entry) = self.databases.get(AI_KEYCHAIN_KEY) else {
        warn!(key = AI_KEYCHAIN_KEY, "keychain is not registered");
        return Ok(false);
      };
      let name = file_name(&entry.source_path)?;
      let today = self.today();
      let candidates = [Some(today), today.checked_sub_days(Days::new(1))];

      let Some(backup) = candidates
        .into_iter()
        .flatten()
        .map(|date| self.backup_root.join(dated_file_name(name, date)))
        .find(|path| path.is_file())
      else {
        warn!(key = AI_KEYCHAIN_KEY, "no recent keychain backup found");
        return Ok(false);
      };

      if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent)?;
      }
      snapshot::write_artifact(&backup, target_path, SnapshotMethod::FileCopy)?;
      info!(from = %backup.display(), to = %target_path.display(), "restored keychain");
      Ok(true)
    })();

    match result {
      Ok(restored) => restored,
      Err(e) => {
        error!(error = %e, "keychain restore failed");
        false
      }
    }
  }

  /// Restore every registered table into `main_db` and the keychain into
  /// `keychain_db`.
  pub fn auto_restore_all(&self, main_db: &Path, keychain_db: &Path) -> Outcome {
    let mut outcome = Outcome::new();
    for config in self.tables.iter() {
      outcome.record(&config.table_name, self.restore_table(main_db, &config.table_name));
    }
    outcome.record(AI_KEYCHAIN_KEY, self.restore_ai_keychain(keychain_db));
    info!(result = %outcome, "auto restore finished");
    outcome
  }

  // ── Inventory ───────────────────────────────────────────────────────────

  /// Row count of each registered table in the main database's newest
  /// dated artifact.
  pub fn get_backup_counts(&self) -> BTreeMap<String, u64> {
    let latest = self.latest_main_artifact().unwrap_or_else(|e| {
      warn!(error = %e, "could not scan backup root");
      None
    });
    self
      .tables
      .iter()
      .map(|config| {
        let table = config.table_name.as_str();
        let count = match &latest {
          Some((path, _)) => inventory::count_table(path, table),
          None => Err(Error::SourceMissing(self.backup_root.join(&self.main_file))),
        };
        (table.to_owned(), count_or_zero(count, table, "backup"))
      })
      .collect()
  }

  /// Row count of each registered table in the live database.
  pub fn get_current_db_counts(&self, main_db: &Path) -> BTreeMap<String, u64> {
    self
      .tables
      .iter()
      .map(|config| {
        let table = config.table_name.as_str();
        let count = inventory::count_table(main_db, table);
        (table.to_owned(), count_or_zero(count, table, "live"))
      })
      .collect()
  }

  /// Presence, size and freshness of each registered database's latest
  /// artifact.
  pub fn backup_summary(&self) -> BackupSummary {
    let rows = self
      .databases
      .iter()
      .filter_map(|entry| {
        match inventory::status_row(entry, &self.source_path(entry), &self.backup_root) {
          Ok(row) => Some(row),
          Err(e) => {
            warn!(key = %entry.key, error = %e, "could not inspect backup");
            None
          }
        }
      })
      .collect();

    let summary = BackupSummary { backup_root: self.backup_root.clone(), rows };
    for row in summary.missing_critical() {
      warn!(key = %row.key, "critical database has no backup");
    }
    summary
  }

  fn table_config(&self, table: &str) -> TableBackupConfig {
    self
      .tables
      .get(table)
      .cloned()
      .unwrap_or_else(|| TableBackupConfig::new(table))
  }
}

fn open_existing(path: &Path) -> Result<Connection> {
  if !path.is_file() {
    return Err(Error::SourceMissing(path.to_path_buf()));
  }
  Ok(Connection::open(path)?)
}

fn log_failure(result: Result<()>, table: &str, message: &str) -> bool {
  match result {
    Ok(()) => true,
    Err(e) => {
      error!(table, error = %e, "{message}");
      false
    }
  }
}

fn count_or_zero(count: Result<u64>, table: &str, side: &str) -> u64 {
  count.unwrap_or_else(|e| {
    warn!(table, side, error = %e, "row count unavailable");
    0
  })
}
