//! `durable` — operator front end for the backup engine.
//!
//! Builds one [`DurableBackupManager`] from `durable.toml` (or the path given
//! with `--config`) plus `DURABLE_*` environment variables, runs a single
//! operation, and exits non-zero if any part of it failed.
//!
//! # Usage
//!
//! ```
//! durable backup
//! durable backup --tables --main-db data/botifython.db
//! durable restore --main-db data/botifython.db --keychain data/ai_keychain.db
//! durable status --json
//! ```

use std::{
  path::{Path, PathBuf},
  process::ExitCode,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use durable_core::{config::BackupConfig, report::Outcome};
use durable_store_sqlite::DurableBackupManager;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(author, version, about = "Back up and restore local SQLite databases")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "durable.toml")]
  config: PathBuf,

  /// Write backups here instead of `~/.{namespace}/backups`.
  #[arg(long, value_name = "DIR")]
  backup_root: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Snapshot every registered database and sweep expired backups.
  Backup {
    /// Also merge the registered tables of `--main-db` into their backups.
    #[arg(long, requires = "main_db")]
    tables: bool,
    #[arg(long, value_name = "DB")]
    main_db: Option<PathBuf>,
  },
  /// Restore registered tables and the AI keychain into a fresh install.
  Restore {
    #[arg(long, value_name = "DB")]
    main_db: PathBuf,
    #[arg(long, value_name = "DB")]
    keychain: PathBuf,
  },
  /// Merge one table from a source database into a backup database.
  Merge {
    #[arg(long, value_name = "DB")]
    source: PathBuf,
    #[arg(long, value_name = "DB")]
    backup: PathBuf,
    #[arg(long)]
    table: String,
  },
  /// Delete dated backups outside the retention window.
  Cleanup {
    /// Defaults to the configured `retention_days`.
    #[arg(long)]
    keep_days: Option<u32>,
  },
  /// Show which databases have backups.
  Status {
    #[arg(long)]
    json: bool,
  },
  /// Row counts of registered tables in the backups and, optionally, live.
  Counts {
    #[arg(long, value_name = "DB")]
    main_db: Option<PathBuf>,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let mut config = load_config(&cli.config)?;
  if let Some(root) = cli.backup_root {
    config.backup_root = Some(root);
  }
  config.backup_root = config.backup_root.as_deref().map(expand_tilde);
  config.app_root = expand_tilde(&config.app_root);
  let retention_days = config.retention_days;

  let manager = DurableBackupManager::new(config).context("failed to set up backup manager")?;

  let ok = match cli.command {
    Command::Backup { tables, main_db } => {
      let mut ok = report("databases", &manager.backup_all_databases());
      if let (true, Some(main_db)) = (tables, main_db) {
        ok &= report("tables", &manager.backup_all_tables(&main_db));
      }
      ok
    }
    Command::Restore { main_db, keychain } => {
      report("restore", &manager.auto_restore_all(&main_db, &keychain))
    }
    Command::Merge { source, backup, table } => {
      let ok = manager.merge_table_data(&source, &backup, &table);
      println!("merge {table}: {}", if ok { "ok" } else { "failed" });
      ok
    }
    Command::Cleanup { keep_days } => {
      let removed = manager.cleanup_old_backups(keep_days.unwrap_or(retention_days));
      println!("removed {removed} expired backup(s)");
      true
    }
    Command::Status { json } => {
      let summary = manager.backup_summary();
      if json {
        println!("{}", summary.to_json()?);
      } else {
        println!("{summary}");
      }
      summary.missing_critical().next().is_none()
    }
    Command::Counts { main_db } => {
      let backup = manager.get_backup_counts();
      let live = main_db.map(|db| manager.get_current_db_counts(&db));
      for (table, count) in &backup {
        match live.as_ref().and_then(|l| l.get(table)) {
          Some(current) => println!("{table:<12} backup {count:>8}  live {current:>8}"),
          None => println!("{table:<12} backup {count:>8}"),
        }
      }
      true
    }
  };

  Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Layer `DURABLE_*` environment variables over the optional config file.
fn load_config(path: &Path) -> anyhow::Result<BackupConfig> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("DURABLE").try_parsing(true))
    .build()
    .context("failed to read config file")?;

  settings
    .try_deserialize()
    .context("failed to deserialise BackupConfig")
}

fn report(label: &str, outcome: &Outcome) -> bool {
  for (key, ok) in outcome.iter() {
    println!("  {key:<14} {}", if ok { "ok" } else { "FAILED" });
  }
  println!("{label}: {outcome} succeeded");
  outcome.all_succeeded()
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::fs;

  use durable_core::config::SnapshotMethod;

  use super::*;

  #[test]
  fn parses_backup_with_tables() {
    let cli = Cli::try_parse_from([
      "durable", "backup", "--tables", "--main-db", "data/botifython.db",
    ])
    .unwrap();
    assert!(matches!(
      cli.command,
      Command::Backup { tables: true, main_db: Some(ref p) } if p == Path::new("data/botifython.db")
    ));
  }

  #[test]
  fn tables_flag_requires_main_db() {
    assert!(Cli::try_parse_from(["durable", "backup", "--tables"]).is_err());
  }

  #[test]
  fn restore_requires_both_paths() {
    assert!(Cli::try_parse_from(["durable", "restore", "--main-db", "a.db"]).is_err());
  }

  #[test]
  fn missing_config_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.app_namespace, "pipulate");
    assert_eq!(cfg.databases.len(), 4);
  }

  #[test]
  fn config_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("durable.toml");
    fs::write(
      &path,
      r#"
        app_namespace = "botifython"
        snapshot_method = "online_backup"

        [[tables]]
        table_name = "profile"
      "#,
    )
    .unwrap();

    let cfg = load_config(&path).unwrap();
    assert_eq!(cfg.app_namespace, "botifython");
    assert_eq!(cfg.snapshot_method, SnapshotMethod::OnlineBackup);
    assert_eq!(cfg.tables.len(), 1);
    assert_eq!(cfg.tables[0].timestamp_field, "updated_at");
  }

  #[test]
  fn expand_tilde_leaves_other_paths() {
    assert_eq!(expand_tilde(Path::new("/abs/x")), PathBuf::from("/abs/x"));
    assert_eq!(expand_tilde(Path::new("rel/x")), PathBuf::from("rel/x"));
    if let Some(home) = dirs::home_dir() {
      assert_eq!(expand_tilde(Path::new("~/b")), home.join("b"));
    }
  }
}
