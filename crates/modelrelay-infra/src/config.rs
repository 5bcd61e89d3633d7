//! Router configuration loader.
//!
//! Layers a TOML file and `MODELRELAY_*` environment overrides into
//! [`RouterConfig`] with figment, where `__` separates nested keys
//! (`MODELRELAY_CACHE__TTL_SECS`). A missing file yields the defaults; an
//! unreadable or malformed file is an error.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Toml};

use modelrelay_types::config::RouterConfig;
use modelrelay_types::error::ConfigError;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "MODELRELAY_";

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "MODELRELAY_CONFIG";

const CONFIG_FILE_NAME: &str = "config.toml";

/// `{config_dir}/modelrelay/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("modelrelay").join(CONFIG_FILE_NAME))
}

/// Pick the config file: explicit path, then `MODELRELAY_CONFIG`, then the
/// platform default.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
        .or_else(default_config_path)
}

pub fn parse_router_config(content: &str) -> Result<RouterConfig, ConfigError> {
    Figment::from(Toml::string(content))
        .extract()
        .map_err(|err| ConfigError::Parse(err.to_string()))
}

/// File contents, or `None` when the file does not exist.
async fn read_config_file(path: &Path) -> Result<Option<String>, ConfigError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            Ok(None)
        }
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Read and parse `path` without environment overrides or validation.
pub async fn read_router_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    match read_config_file(path).await? {
        Some(content) => parse_router_config(&content),
        None => Ok(RouterConfig::default()),
    }
}

/// Load `path`, apply process environment overrides, and validate.
pub async fn load_router_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    let content = read_config_file(path).await?;
    let config = layer_router_config(content.as_deref(), ENV_PREFIX)?;
    config.validate()?;
    Ok(config)
}

/// Merge, later sources winning:
/// 1. field defaults
/// 2. `content` (TOML), when present
/// 3. environment variables starting with `env_prefix`, `__` nesting keys
///    (`MODELRELAY_CACHE__TTL_SECS=30`, `MODELRELAY_FALLBACK_CHAIN='["b", "a"]'`)
///
/// The result is not validated.
pub fn layer_router_config(
    content: Option<&str>,
    env_prefix: &str,
) -> Result<RouterConfig, ConfigError> {
    let figment = match content {
        Some(content) => Figment::from(Toml::string(content)),
        None => Figment::new(),
    };
    // A broken file is reported as such even when the environment is also bad.
    figment
        .extract::<RouterConfig>()
        .map_err(|err| ConfigError::Parse(err.to_string()))?;

    figment
        .merge(Env::prefixed(env_prefix).split("__").ignore(&["config"]))
        .extract()
        .map_err(|err| ConfigError::EnvOverride {
            key: format!("{env_prefix}{}", err.path.join("__").to_ascii_uppercase()),
            message: err.to_string(),
        })
}
