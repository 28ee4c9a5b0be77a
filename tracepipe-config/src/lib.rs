//! Configuration for the tracepipe span ingester.
//!
//! The configuration is read from a `config.yml` file in a configuration directory and may then be
//! overridden from environment variables:
//!
//! ```no_run
//! use tracepipe_config::{Config, OverridableConfig};
//!
//! let mut config = Config::from_path("/etc/tracepipe")?;
//! config.apply_override(OverridableConfig::from_env())?;
//! config.init_logging();
//! # Ok::<(), tracepipe_config::ConfigError>(())
//! ```
#![warn(missing_docs)]

mod config;
mod overrides;

pub use crate::config::*;
pub use crate::overrides::*;
