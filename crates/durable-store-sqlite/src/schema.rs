//! Additive schema migration for merge-enabled tables.
//!
//! Columns are only ever added. Existing columns are never dropped, renamed
//! or retyped.

use durable_core::{registry::TableBackupConfig, schema::SchemaCapability};
use rusqlite::Connection;
use tracing::info;

use crate::{
  Error, Result,
  sql::{create_statement, quote_ident, table_columns},
};

/// Classify `config.table_name` in `conn`.
pub fn capability(conn: &Connection, config: &TableBackupConfig) -> Result<SchemaCapability> {
  let columns: Vec<String> = table_columns(conn, &config.table_name)?
    .into_iter()
    .map(|c| c.name)
    .collect();
  if columns.is_empty() {
    return Err(Error::TableNotFound(config.table_name.clone()));
  }
  Ok(SchemaCapability::from_columns(config, &columns))
}

/// Add the timestamp and soft-delete columns if either is missing.
///
/// Both are nullable `TEXT`. Returns the names of the columns added.
pub fn ensure_merge_fields(conn: &Connection, config: &TableBackupConfig) -> Result<Vec<String>> {
  let missing = match capability(conn, config)? {
    SchemaCapability::HasMergeFields => return Ok(Vec::new()),
    SchemaCapability::MissingMergeFields { missing } => missing,
  };

  for column in &missing {
    conn.execute_batch(&format!(
      "ALTER TABLE {} ADD COLUMN {} TEXT",
      quote_ident(&config.table_name),
      quote_ident(column),
    ))?;
    info!(table = %config.table_name, column = %column, "added merge column");
  }
  Ok(missing)
}

/// Make `dest.table` able to receive every column of `source.table`.
///
/// Creates the table from the source's DDL when it is absent, otherwise adds
/// any source columns the destination lacks.
pub fn ensure_table_like(source: &Connection, dest: &Connection, table: &str) -> Result<()> {
  let source_columns = table_columns(source, table)?;
  if source_columns.is_empty() {
    return Err(Error::TableNotFound(table.to_owned()));
  }

  let dest_columns = table_columns(dest, table)?;
  if dest_columns.is_empty() {
    let ddl = create_statement(source, table)?
      .ok_or_else(|| Error::TableNotFound(table.to_owned()))?;
    dest.execute_batch(&ddl)?;
    info!(table, "created table in destination");
    return Ok(());
  }

  for column in source_columns
    .iter()
    .filter(|c| !dest_columns.iter().any(|d| d.name == c.name))
  {
    let decl = if column.decl_type.is_empty() {
      String::new()
    } else {
      format!(" {}", column.decl_type)
    };
    dest.execute_batch(&format!(
      "ALTER TABLE {} ADD COLUMN {}{decl}",
      quote_ident(table),
      quote_ident(&column.name),
    ))?;
    info!(table, column = %column.name, "added column to destination");
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn names(conn: &Connection, table: &str) -> Vec<String> {
    table_columns(conn, table).unwrap().into_iter().map(|c| c.name).collect()
  }

  #[test]
  fn ensure_merge_fields_is_additive_and_idempotent() {
    let conn = Connection::open_in_memory().unwrap();
    conn
      .execute_batch("CREATE TABLE profile (id INTEGER PRIMARY KEY, name TEXT);
                      INSERT INTO profile (name) VALUES ('Alice');")
      .unwrap();
    let cfg = TableBackupConfig::new("profile");

    let added = ensure_merge_fields(&conn, &cfg).unwrap();
    assert_eq!(added, ["updated_at", "deleted_at"]);
    assert_eq!(names(&conn, "profile"), ["id", "name", "updated_at", "deleted_at"]);
    assert!(ensure_merge_fields(&conn, &cfg).unwrap().is_empty());

    let name: String = conn
      .query_row("SELECT name FROM profile", [], |r| r.get(0))
      .unwrap();
    assert_eq!(name, "Alice");
  }

  #[test]
  fn missing_table_is_an_error() {
    let conn = Connection::open_in_memory().unwrap();
    let cfg = TableBackupConfig::new("profile");
    assert!(matches!(capability(&conn, &cfg), Err(Error::TableNotFound(_))));
  }

  #[test]
  fn ensure_table_like_creates_then_aligns() {
    let source = Connection::open_in_memory().unwrap();
    let dest = Connection::open_in_memory().unwrap();
    source
      .execute_batch("CREATE TABLE tasks (id INTEGER PRIMARY KEY, text TEXT)")
      .unwrap();

    ensure_table_like(&source, &dest, "tasks").unwrap();
    assert_eq!(names(&dest, "tasks"), ["id", "text"]);

    source.execute_batch("ALTER TABLE tasks ADD COLUMN priority INTEGER").unwrap();
    ensure_table_like(&source, &dest, "tasks").unwrap();
    assert_eq!(names(&dest, "tasks"), ["id", "text", "priority"]);
  }
}
