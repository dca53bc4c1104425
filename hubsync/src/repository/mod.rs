//! Access to the remote dataset repository.
//!
//! The [`Repository`] trait is the only way the flows talk to the hub. [`hub::HubRepository`]
//! speaks the hub HTTP API, [`memory::MemoryRepository`] keeps everything in process.

mod base;
pub mod hub;
pub mod memory;

pub use base::{CommitOptions, Repository};
