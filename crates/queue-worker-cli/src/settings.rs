//! Worker configuration loading.
//!
//! Sources, later ones overriding earlier ones:
//!
//! 1. `AWS_DEFAULT_REGION`, `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` as
//!    defaults for the SQS provider
//! 2. `/etc/queue-worker/worker.yaml`
//! 3. `./config/worker.yaml`
//! 4. The file named by `QW_CONFIG_FILE`
//! 5. The file given with `--config` (format taken from its extension)
//! 6. Environment variables prefixed `QW__`, e.g.
//!    `QW__CONSUMER__MAX_CONCURRENT_TASKS=8`
//!
//! Missing optional files are skipped. A file that exists but cannot be
//! parsed is an error.

use queue_worker_core::ConsumerConfig;
use queue_worker_runtime::ProviderConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const SYSTEM_CONFIG: &str = "/etc/queue-worker/worker";
const LOCAL_CONFIG: &str = "config/worker";
const CONFIG_FILE_ENV: &str = "QW_CONFIG_FILE";
const ENV_PREFIX: &str = "QW";

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] queue_worker_core::ConfigError),

    #[error("Failed to render configuration: {message}")]
    Render { message: String },
}

/// Resolved worker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Queue backend
    pub provider: ProviderConfig,

    /// Consumer settings
    pub consumer: ConsumerConfig,
}

impl WorkerConfig {
    /// Copy with credentials masked, for display
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let ProviderConfig::AwsSqs(aws) = &mut config.provider {
            if aws.secret_access_key.is_some() {
                aws.secret_access_key = Some("***".to_string());
            }
        }
        config
    }
}

/// Output format for the resolved configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
    /// TOML format
    Toml,
}

/// Render `config` in the requested format
pub fn render(config: &WorkerConfig, format: ConfigFormat) -> Result<String, ConfigError> {
    let rendered = match format {
        ConfigFormat::Yaml => serde_yaml::to_string(config).map_err(|e| e.to_string()),
        ConfigFormat::Json => serde_json::to_string_pretty(config).map_err(|e| e.to_string()),
        ConfigFormat::Toml => toml::to_string_pretty(config).map_err(|e| e.to_string()),
    };

    rendered.map_err(|message| ConfigError::Render { message })
}

/// Load configuration from the standard locations, the environment and an
/// optional explicit file
pub fn load_configuration(explicit: Option<&Path>) -> Result<WorkerConfig, ConfigError> {
    let mut builder = config::Config::builder().set_default("provider.type", "in_memory")?;

    for (key, variable) in [
        ("provider.region", "AWS_DEFAULT_REGION"),
        ("provider.access_key_id", "AWS_ACCESS_KEY_ID"),
        ("provider.secret_access_key", "AWS_SECRET_ACCESS_KEY"),
    ] {
        if let Some(value) = non_empty_env(variable) {
            builder = builder.set_default(key, value)?;
        }
    }

    builder = builder
        .add_source(
            config::File::with_name(SYSTEM_CONFIG)
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name(LOCAL_CONFIG)
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Some(path) = non_empty_env(CONFIG_FILE_ENV) {
        info!(path = %path, "Loading configuration from {}", CONFIG_FILE_ENV);
        builder = builder.add_source(
            config::File::with_name(&path)
                .required(true)
                .format(config::FileFormat::Yaml),
        );
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        info!(path = %path.display(), "Loading configuration from explicit path");
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let config: WorkerConfig = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    Ok(config)
}

fn non_empty_env(variable: &str) -> Option<String> {
    std::env::var(variable).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
