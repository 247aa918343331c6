//! # gristle-settings
//!
//! Configuration for the Gristle event relay.
//!
//! Configuration is loaded once at startup from two layers, later wins:
//! 1. **Config file**: YAML, default `/etc/gristle/config.yaml`
//! 2. **Environment variables**: `GRISTLE_*` overrides, `__` separates
//!    nested keys (e.g. `GRISTLE_SSHD__PORT=2222`)
//!
//! The merged result is validated before it is handed out; nothing mutates
//! it afterwards.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{DEFAULT_CONFIG_PATH, ENV_PREFIX, figment, load_config};
pub use types::*;
