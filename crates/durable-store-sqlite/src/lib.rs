//! SQLite backup engine.
//!
//! [`DurableBackupManager`] keeps copies of the host application's SQLite
//! databases in a directory outside the application tree, merges selected
//! tables row by row, and restores them into a fresh install.
//!
//! Soft-deleted rows are preserved and merged like any other row. Nothing in
//! this crate filters them; callers that read restored tables must skip rows
//! whose soft-delete column is set.

mod sql;

pub mod error;
pub mod inventory;
pub mod location;
pub mod manager;
pub mod merge;
pub mod retention;
pub mod schema;
pub mod snapshot;

pub use error::{Error, Result};
pub use manager::DurableBackupManager;
