//! Error type for `durable-store-sqlite`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] durable_core::Error),

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("could not determine the user's home directory")]
  NoHomeDirectory,

  #[error("source database not found: {}", .0.display())]
  SourceMissing(PathBuf),

  #[error("path has no usable file name: {}", .0.display())]
  InvalidPath(PathBuf),

  #[error("table {0:?} does not exist")]
  TableNotFound(String),

  /// The configured primary key column is absent from the table.
  #[error("table {table:?} has no column {column:?}")]
  MissingColumn { table: String, column: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
