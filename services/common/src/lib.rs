//! Shared building blocks for the retail order pipeline stages
//!
//! Every stage binary (extract, transform, load, reporting) depends on this crate for:
//! - The typed project layout (which file each stage reads and writes)
//! - The `config.yaml` database settings
//! - Row models for the staging table and the star schema
//! - The Parquet codec used for the staging and transformed files
//! - The shared error type and logging setup

pub mod columnar;
pub mod config;
pub mod db;
pub mod error;
pub mod layout;
pub mod model;
pub mod telemetry;

pub use error::{EtlError, Result};
