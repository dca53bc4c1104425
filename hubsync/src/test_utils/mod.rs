//! Helpers for testing flows against in-memory repositories.
//!
//! - [`observation`] builds observation files and seeds repositories with them
//! - [`faulty_repository`] wraps a repository to inject failures and count calls
//! - [`failpoints`] configures failpoints for the duration of a test

pub mod failpoints;
pub mod faulty_repository;
pub mod observation;
