mod format;

pub use format::{Format, FormatHint};

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checks::memcached::InstanceConfig;

pub const fn default_interval() -> u64 {
    15
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("either \"url\" or \"socket\" must be set")]
    MissingAddress,

    #[error("\"url\" and \"socket\" are mutually exclusive")]
    AmbiguousAddress,

    #[error("\"port\" is set but \"url\" is not")]
    PortWithoutHost,

    #[error("\"{0}\" must not be empty")]
    Empty(&'static str),

    #[error("\"{0}\" must be greater than zero")]
    Zero(&'static str),

    #[error("no instances configured")]
    NoInstances,

    #[error("instance #{index}: {err}")]
    Instance { index: usize, err: Box<ConfigError> },

    #[error("read config file {path:?} failed: {err}")]
    Read { path: PathBuf, err: std::io::Error },

    #[error("parse config {path:?} failed: {err}")]
    Parse { path: PathBuf, err: String },
}

impl ConfigError {
    pub fn instance(index: usize, err: ConfigError) -> Self {
        ConfigError::Instance {
            index,
            err: Box::new(err),
        }
    }
}

/// Settings shared by every instance.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InitConfig {
    /// Seconds between two runs of every instance.
    #[serde(default = "default_interval")]
    pub min_collection_interval: u64,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            min_collection_interval: default_interval(),
        }
    }
}

/// A check configuration file, the usual `init_config` + `instances` pair.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CheckConfig {
    /// `init_config:` left empty in yaml is a null, treat it as the default.
    #[serde(default)]
    pub init_config: Option<InitConfig>,

    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

impl CheckConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            err,
        })?;

        let config = format::deserialize(&content, Format::from_path(path).ok()).map_err(
            |err| ConfigError::Parse {
                path: path.to_path_buf(),
                err,
            },
        )?;

        debug!(message = "Config loaded", ?path);

        Ok(config)
    }

    pub fn parse(content: &str, format: FormatHint) -> Result<Self, ConfigError> {
        format::deserialize(content, format).map_err(|err| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            err,
        })
    }

    pub fn interval(&self) -> Duration {
        let secs = self
            .init_config
            .as_ref()
            .map(|init| init.min_collection_interval)
            .unwrap_or_else(default_interval);

        Duration::from_secs(secs)
    }
}
