//! Config loading and schema.

mod load;
mod schema;

pub use load::{apply_env_overrides, config_path, load, load_or_default, ConfigError};
pub use schema::{
    Config, FileLoggingConfig, LogFormat, LogRotation, LoggingConfig, Network, ReplayConfig,
};
