//! Command handlers -- one module per subcommand

pub mod config;
pub mod scan;
pub mod tools;

use std::path::Path;

use tracing::debug;

use codewarden_core::config::CodewardenConfig;

use crate::cli::DEFAULT_CONFIG_PATH;
use crate::error::CliError;

/// Label used as the configuration source when no file is read.
pub const BUILTIN_DEFAULTS: &str = "(built-in defaults)";

/// Effective configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: CodewardenConfig,
    pub source: String,
}

/// Resolve and load the effective configuration.
///
/// An explicit `--config` path must exist. Without one, `./codewarden.toml` is
/// used when present, otherwise the built-in defaults. Environment overrides
/// and validation apply in every case.
pub async fn load_config(path: Option<&Path>) -> Result<LoadedConfig, CliError> {
    let path = match path {
        Some(path) => path,
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if !tokio::fs::try_exists(default).await.unwrap_or(false) {
                debug!("no configuration file found, using built-in defaults");
                let mut config = CodewardenConfig::default();
                config.apply_env_overrides();
                config.validate()?;
                return Ok(LoadedConfig {
                    config,
                    source: BUILTIN_DEFAULTS.to_owned(),
                });
            }
            default
        }
    };

    let config = CodewardenConfig::load(path).await?;
    Ok(LoadedConfig {
        config,
        source: path.display().to_string(),
    })
}
