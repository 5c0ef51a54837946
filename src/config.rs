use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::Layout;
use crate::error::KiraError;
use crate::fetch::RetryPolicy;

pub const LOCAL_CONFIG_FILE: &str = "kira-ih.json";
pub const DEFAULT_DELAY: Duration = Duration::from_millis(150);
pub const DEFAULT_DOWNLOAD_DIR: &str = "dataset";
pub const DEFAULT_RETRY_DIR: &str = "dataset_retry";

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub delay_secs: Option<f64>,
    #[serde(default)]
    pub layout: Option<Layout>,
    #[serde(default)]
    pub download_output_dir: Option<String>,
    #[serde(default)]
    pub retry_output_dir: Option<String>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub initial_backoff_secs: Option<f64>,
    #[serde(default)]
    pub timeout_secs: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub delay: Duration,
    /// `None` lets each command pick its own layout.
    pub layout: Option<Layout>,
    pub download_output_dir: PathBuf,
    pub retry_output_dir: PathBuf,
    pub retry: RetryPolicy,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            delay: DEFAULT_DELAY,
            layout: None,
            download_output_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            retry_output_dir: PathBuf::from(DEFAULT_RETRY_DIR),
            retry: RetryPolicy::default(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must be readable. Without one, the first existing
    /// file among the default locations is used, or built-in defaults.
    pub fn resolve(path: Option<&Path>) -> Result<ResolvedConfig, KiraError> {
        Self::resolve_with_locations(path, &default_locations())
    }

    pub fn resolve_with_locations(
        path: Option<&Path>,
        locations: &[PathBuf],
    ) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => locations.iter().find(|candidate| candidate.is_file()).cloned(),
        };
        let Some(config_path) = config_path else {
            return Ok(ResolvedConfig::default());
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;
        tracing::debug!(path = %config_path.display(), "loaded config file");

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let defaults = ResolvedConfig::default();
        let retry = config.retry.unwrap_or_default();

        let limit = retry.limit.unwrap_or(defaults.retry.limit);
        if limit == 0 {
            return Err(KiraError::InvalidConfig(
                "retry.limit must be at least 1".to_string(),
            ));
        }
        let timeout = match retry.timeout_secs {
            Some(secs) => seconds("retry.timeout_secs", secs)?,
            None => defaults.retry.timeout,
        };
        if timeout.is_zero() {
            return Err(KiraError::InvalidConfig(
                "retry.timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(defaults.schema_version),
            delay: match config.delay_secs {
                Some(secs) => seconds("delay_secs", secs)?,
                None => defaults.delay,
            },
            layout: config.layout,
            download_output_dir: config
                .download_output_dir
                .map(PathBuf::from)
                .unwrap_or(defaults.download_output_dir),
            retry_output_dir: config
                .retry_output_dir
                .map(PathBuf::from)
                .unwrap_or(defaults.retry_output_dir),
            retry: RetryPolicy {
                limit,
                initial_backoff: match retry.initial_backoff_secs {
                    Some(secs) => seconds("retry.initial_backoff_secs", secs)?,
                    None => defaults.retry.initial_backoff,
                },
                timeout,
            },
        })
    }
}

/// Converts a user-supplied number of seconds, rejecting negatives and NaN.
pub fn seconds(name: &str, value: f64) -> Result<Duration, KiraError> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        KiraError::InvalidConfig(format!(
            "{name} must be a non-negative number of seconds, got {value}"
        ))
    })
}

pub fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(dirs) = BaseDirs::new() {
        locations.push(
            dirs.config_dir()
                .join("kira-image-harvester")
                .join("config.json"),
        );
    }
    locations
}
