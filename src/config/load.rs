use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::schema::{Config, Network};

const DEFAULT_CONFIG_FILE: &str = "claimtrie.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("environment variable {var} has invalid value `{value}`")]
    InvalidEnv { var: &'static str, value: String },
}

pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(path) = std::env::var_os("CLAIMTRIE_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Load the config file (missing file means defaults), then apply env
/// overrides.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = config_path(explicit);
    let mut config = if path.exists() {
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })?
    } else {
        Config::default()
    };
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// As [`load`], but degrade to defaults with a warning instead of
/// failing; the caller still gets a usable config for logging setup.
pub fn load_or_default(explicit: Option<&Path>) -> Config {
    match load(explicit) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config load failed, using defaults: {err}");
            let mut config = Config::default();
            let _ = apply_env_overrides(&mut config);
            config
        }
    }
}

pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if let Ok(dir) = std::env::var("CLAIMTRIE_DATA_DIR") {
        if !dir.is_empty() {
            config.data_dir = Some(PathBuf::from(dir));
        }
    }
    if let Ok(raw) = std::env::var("CLAIMTRIE_NETWORK") {
        if !raw.is_empty() {
            config.network =
                Network::parse(&raw).ok_or(ConfigError::InvalidEnv {
                    var: "CLAIMTRIE_NETWORK",
                    value: raw,
                })?;
        }
    }
    if let Ok(raw) = std::env::var("CLAIMTRIE_TARGET_HEIGHT") {
        if !raw.is_empty() {
            config.replay.target_height =
                raw.parse().map_err(|_| ConfigError::InvalidEnv {
                    var: "CLAIMTRIE_TARGET_HEIGHT",
                    value: raw,
                })?;
        }
    }
    Ok(())
}
