use std::fmt;
use std::time::Duration;

use event::{Tags, tags};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

pub const DEFAULT_PORT: u16 = 11211;

const fn default_timeout() -> u64 {
    5
}

/// Optional groups of stats, each costs one more command per cycle.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Options {
    /// Issue `stats items` and report per slab class item stats.
    #[serde(default)]
    pub items: bool,

    /// Issue `stats slabs` and report per slab class allocation stats.
    #[serde(default)]
    pub slabs: bool,
}

/// One memcached server to poll.
///
/// Exactly one of `url` and `socket` must be set.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceConfig {
    /// Hostname or IP address of the server.
    #[serde(default, alias = "host", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// TCP port, defaults to 11211.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Path of the unix socket the server listens on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<String>,

    /// Extra tags added to every metric of this instance.
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub options: Options,

    /// Seconds a whole fetch may take before the server is considered down.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            url: None,
            port: None,
            socket: None,
            tags: vec![],
            options: Options::default(),
            timeout: default_timeout(),
        }
    }
}

impl InstanceConfig {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            url: Some(host.into()),
            port: Some(port),
            ..Default::default()
        }
    }

    pub fn unix(path: impl Into<String>) -> Self {
        Self {
            socket: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn with_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Resolve the addressing mode, no network activity involved.
    pub fn address(&self) -> Result<Address, ConfigError> {
        match (&self.url, &self.socket) {
            (Some(_), Some(_)) => Err(ConfigError::AmbiguousAddress),
            (None, None) => {
                if self.port.is_some() {
                    Err(ConfigError::PortWithoutHost)
                } else {
                    Err(ConfigError::MissingAddress)
                }
            }
            (Some(host), None) => {
                let host = host.trim();
                if host.is_empty() {
                    return Err(ConfigError::Empty("url"));
                }

                Ok(Address::Tcp {
                    host: host.to_string(),
                    port: self.port.unwrap_or(DEFAULT_PORT),
                })
            }
            (None, Some(path)) => {
                if self.port.is_some() {
                    return Err(ConfigError::AmbiguousAddress);
                }

                if path.is_empty() {
                    return Err(ConfigError::Empty("socket"));
                }

                Ok(Address::Unix { path: path.clone() })
            }
        }
    }

    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        if self.timeout == 0 {
            return Err(ConfigError::Zero("timeout"));
        }

        Ok(Duration::from_secs(self.timeout))
    }
}

/// Where the server lives, resolved from [`InstanceConfig`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Address {
    Tcp { host: String, port: u16 },
    Unix { path: String },
}

impl Address {
    /// Tag attached to every metric, `url:host:port` or `url:unix:path`.
    pub fn metric_tags(&self) -> Tags {
        tags!("url" => self.to_string())
    }

    /// Tags of the `can_connect` service check, `host:unix` plus the socket
    /// path as port for unix sockets.
    pub fn service_check_tags(&self) -> Tags {
        match self {
            Address::Tcp { host, port } => tags!(
                "host" => host,
                "port" => port.to_string()
            ),
            Address::Unix { path } => tags!(
                "host" => "unix",
                "port" => path
            ),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Tcp { host, port } => write!(f, "{host}:{port}"),
            Address::Unix { path } => write!(f, "unix:{path}"),
        }
    }
}
