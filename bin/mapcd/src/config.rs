//! Figment-based configuration loading.
//!
//! Configuration priority (highest wins):
//! 1. CLI arguments (applied after Figment load)
//! 2. Config file (TOML)
//! 3. Environment variables (`MAPC_` prefix, `__` separates sections)
//! 4. Defaults

use std::path::Path;

use eyre::{Result, WrapErr};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use mapc_service::ServiceConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cli::ConfigArgs;

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct DaemonConfig {
    /// Connection manager settings.
    pub(crate) service: ServiceConfig,
}

impl DaemonConfig {
    /// Load configuration from defaults, environment, and config file.
    /// CLI overrides should be applied separately after loading.
    pub(crate) fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(DaemonConfig::default()))
            .merge(Env::prefixed("MAPC_").split("__"));

        if let Some(path) = config_path {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            } else {
                warn!(path = %path.display(), "Config file not found, using defaults");
            }
        }

        figment.extract().wrap_err("Failed to load configuration")
    }

    /// Load and apply CLI overrides.
    pub(crate) fn from_args(args: &ConfigArgs) -> Result<Self> {
        let mut config = Self::load(args.config.as_deref())?;
        if let Some(max_concurrent) = args.max_concurrent {
            config.service.max_concurrent = max_concurrent;
        }
        Ok(config)
    }
}

/// `mapcd config`: print the merged configuration.
pub(crate) fn print(args: &ConfigArgs) -> Result<()> {
    let config = DaemonConfig::from_args(args)?;
    let rendered = toml::to_string_pretty(&config)
        .wrap_err("Failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}
