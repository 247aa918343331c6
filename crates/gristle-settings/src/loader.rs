//! Config loading: YAML file merged with `GRISTLE_*` environment overrides.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::GristleConfig;

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/gristle/config.yaml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "GRISTLE_";

/// Build the layered provider for `path` without extracting it.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load, merge and validate the configuration at `path`.
///
/// A missing file is an error: the service has no useful defaults for
/// keys, accounts or repositories.
pub fn load_config(path: &Path) -> Result<GristleConfig> {
    if !path.is_file() {
        return Err(SettingsError::NotFound(path.to_path_buf()));
    }
    debug!(?path, "loading config");
    let config: GristleConfig = figment(path).extract()?;
    config.validate()?;
    debug!(
        accounts = config.accounts.len(),
        repos = config.repos().count(),
        "config loaded"
    );
    Ok(config)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
