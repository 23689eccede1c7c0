//! Reporting - read-only analytics over the loaded star schema
//!
//! Shared by the `analytics`, `visualize` and `inspect` binaries.

pub mod charts;
pub mod inspect;
pub mod queries;
