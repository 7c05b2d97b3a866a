//! Core types for the durable backup engine.
//!
//! This crate holds configuration, registries, artifact naming and reporting
//! types. It has no database or filesystem dependencies; the SQLite engine in
//! `durable-store-sqlite` builds on it.

pub mod artifact;
pub mod config;
pub mod error;
pub mod registry;
pub mod report;
pub mod schema;
pub mod timestamp;

pub use error::{Error, Result};
