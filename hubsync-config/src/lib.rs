//! Configuration types and loading for hubsync.
//!
//! [`load_config`] layers an optional configuration file and `HUBSYNC_`-prefixed
//! environment variables on top of the defaults declared in [`shared`].

mod load;
pub mod shared;

pub use load::{Config, LoadConfigError, Map, Value, load_config, load_config_from};
