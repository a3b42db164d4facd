//! Configuration surface for the nodewarden HA coordinator (spec §6).
//!
//! Hierarchical loading from multiple sources, highest precedence last:
//! 1. Built-in defaults.
//! 2. `~/.config/nodewarden/config.toml` (user defaults).
//! 3. `nodewarden.toml` (git-tracked, project config).
//! 4. `nodewarden.local.toml` (gitignored, local overrides).
//! 5. Environment variables (`NODEWARDEN_*`).

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// The full configuration surface named in spec §6: node identity, the
/// externally reachable endpoint, the HA lease parameters, and log level.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodewardenConfig {
    pub node: NodeConfig,
    pub server: ServerConfig,
    pub ha: HaConfig,
    pub log: LogConfig,
}

/// Node identity. An empty `name` denotes the standalone sentinel node
/// (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub name: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self { name: String::new() }
    }
}

/// The externally reachable endpoint most recently observed for this
/// node, as a raw `host[:port]` string (parsed by [`AddressSpec::parse`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
        }
    }
}

impl ServerConfig {
    /// Parses [`ServerConfig::address`] into a host/port pair, applying
    /// the default port (10051) when none is given.
    pub fn parse_address(&self) -> Result<AddressSpec, ConfigError> {
        AddressSpec::parse(&self.address)
    }
}

/// The HA lease parameters: failover delay and whether audit logging of
/// state transitions is enabled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HaConfig {
    pub failover_delay_secs: i64,
    pub auditlog_enabled: bool,
}

impl Default for HaConfig {
    fn default() -> Self {
        Self {
            failover_delay_secs: 60,
            auditlog_enabled: true,
        }
    }
}

/// Log-level control (spec §1: out of scope beyond the surface it exposes).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

const DEFAULT_PORT: u16 = 10051;

/// A parsed `host[:port]` address, mirroring the original's
/// `parse_serveractive_element` contract: a bare host defaults to port
/// 10051; `host:port` uses the explicit port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSpec {
    pub host: String,
    pub port: u16,
}

impl AddressSpec {
    /// Parses `spec`. An empty string parses to `("", DEFAULT_PORT)`,
    /// matching an unregistered node's as-yet-unobserved address.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        if spec.is_empty() {
            return Ok(Self {
                host: String::new(),
                port: DEFAULT_PORT,
            });
        }
        match spec.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port: u16 = port
                    .parse()
                    .map_err(|_| ConfigError::InvalidAddress(spec.to_string()))?;
                Ok(Self {
                    host: host.to_string(),
                    port,
                })
            }
            Some(_) => Err(ConfigError::InvalidAddress(spec.to_string())),
            None => Ok(Self {
                host: spec.to_string(),
                port: DEFAULT_PORT,
            }),
        }
    }
}

impl Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl NodewardenConfig {
    /// Loads configuration from the default hierarchy of sources rooted
    /// at the current directory.
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Loads configuration from a specific project directory.
    pub fn load_from_dir(project_dir: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// True when `node.name` is empty — the standalone sentinel (spec §3).
    #[must_use]
    pub fn is_standalone(&self) -> bool {
        self.node.name.is_empty()
    }
}
