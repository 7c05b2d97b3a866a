//! Error types for `durable-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("registry entry has an empty key")]
  EmptyKey,

  #[error("duplicate database key in registry: {0:?}")]
  DuplicateKey(String),

  #[error("duplicate table in registry: {0:?}")]
  DuplicateTable(String),

  #[error("main database {0:?} is not in the database registry")]
  UnknownMainDatabase(String),

  /// A value in a timestamp column is not a recognised ISO-8601 instant.
  #[error("malformed timestamp: {0:?}")]
  InvalidTimestamp(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
