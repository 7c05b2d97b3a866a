//! Small SQL helpers shared by the schema, merge and inventory modules.
//!
//! Table and column names come from configuration and live schemas, so they
//! are always quoted with [`quote_ident`] before being spliced into SQL.

use std::path::Path;

use rusqlite::{Connection, OpenFlags, OptionalExtension as _, types::Value};

use crate::Result;

pub fn quote_ident(name: &str) -> String {
  format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn open_read_only(path: &Path) -> Result<Connection> {
  Ok(Connection::open_with_flags(
    path,
    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
  )?)
}

// ─── Introspection ───────────────────────────────────────────────────────────

/// One row of `PRAGMA table_info`.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
  pub name:      String,
  pub decl_type: String,
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        rusqlite::params![table],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

/// Columns of `table` in declaration order; empty if the table is absent.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
  let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
  let columns = stmt
    .query_map([], |row| {
      Ok(ColumnInfo {
        name:      row.get(1)?,
        decl_type: row.get(2)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(columns)
}

/// The `CREATE TABLE` statement SQLite recorded for `table`.
pub fn create_statement(conn: &Connection, table: &str) -> Result<Option<String>> {
  Ok(
    conn
      .query_row(
        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
        rusqlite::params![table],
        |row| row.get(0),
      )
      .optional()?,
  )
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// Every row of a table, column-aligned with `columns`.
pub struct TableRows {
  pub columns: Vec<String>,
  pub rows:    Vec<Vec<Value>>,
}

impl TableRows {
  pub fn position(&self, column: &str) -> Option<usize> {
    self.columns.iter().position(|c| c == column)
  }
}

pub fn read_rows(conn: &Connection, table: &str) -> Result<TableRows> {
  let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(table)))?;
  let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();
  let width = columns.len();

  let rows = stmt
    .query_map([], |row| {
      (0..width).map(|i| row.get::<_, Value>(i)).collect::<rusqlite::Result<Vec<_>>>()
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  Ok(TableRows { columns, rows })
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<u64> {
  let count: i64 = conn.query_row(
    &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
    [],
    |row| row.get(0),
  )?;
  Ok(count.max(0) as u64)
}

/// `INSERT INTO table (columns…) VALUES (?1, …)`.
pub fn insert_sql(table: &str, columns: &[String]) -> String {
  let names: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
  let params: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
  format!(
    "INSERT INTO {} ({}) VALUES ({})",
    quote_ident(table),
    names.join(", "),
    params.join(", ")
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn quotes_embedded_quotes() {
    assert_eq!(quote_ident("profile"), "\"profile\"");
    assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
  }

  #[test]
  fn insert_sql_numbers_params() {
    let sql = insert_sql("tasks", &["id".into(), "name".into()]);
    assert_eq!(sql, "INSERT INTO \"tasks\" (\"id\", \"name\") VALUES (?1, ?2)");
  }

  #[test]
  fn introspects_in_memory_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn
      .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT);
                      INSERT INTO t (name) VALUES ('a'), ('b');")
      .unwrap();

    assert!(table_exists(&conn, "t").unwrap());
    assert!(!table_exists(&conn, "missing").unwrap());
    assert!(table_columns(&conn, "missing").unwrap().is_empty());

    let cols: Vec<_> = table_columns(&conn, "t").unwrap().into_iter().map(|c| c.name).collect();
    assert_eq!(cols, ["id", "name"]);
    assert_eq!(count_rows(&conn, "t").unwrap(), 2);

    let rows = read_rows(&conn, "t").unwrap();
    assert_eq!(rows.position("name"), Some(1));
    assert_eq!(rows.rows[0][1], Value::Text("a".into()));
  }
}
