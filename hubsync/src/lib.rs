//! Keeps a Parquet snapshot of a hub dataset in sync with the per-observation JSON files
//! uploaded next to it.
//!
//! The [`flows`] module holds the two entry points. Everything remote goes through the
//! [`repository::Repository`] trait, implemented over the hub HTTP API and in memory.

pub mod error;
pub mod failpoints;
pub mod flows;
pub mod lister;
mod macros;
pub mod merger;
pub mod publisher;
pub mod record;
pub mod repository;
pub mod snapshot;
pub mod table;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
