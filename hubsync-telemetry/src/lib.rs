//! Logging setup shared by hubsync binaries and tests.

pub mod tracing;
