use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use gss_protocol::{BusAddress, MAX_FRAME_SIZE};

use crate::error::{ServerError, ServerResult};

/// Largest payload a frame header can describe: the `u32` length also
/// counts the tag byte.
const MAX_CONFIGURABLE_FRAME: usize = u32::MAX as usize - 1;

/// Where the service listens for bus connections.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenAddr {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp:{addr}"),
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

impl FromStr for ListenAddr {
    type Err = ServerError;

    /// Accepts `unix:<path>`, `tcp:<addr>` or a bare socket address.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(path) = s.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(ServerError::Config("empty unix socket path".into()));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        let addr = s.strip_prefix("tcp:").unwrap_or(s);
        addr.parse()
            .map(Self::Tcp)
            .map_err(|e| ServerError::Config(format!("invalid listen address {s:?}: {e}")))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: ListenAddr,
    pub bus: BusAddress,
    /// Per-subscriber change event buffer.
    pub channel_capacity: usize,
    pub max_connections: usize,
    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: ListenAddr::Tcp(SocketAddr::from(([127, 0, 0, 1], 7411))),
            bus: BusAddress::default(),
            channel_capacity: 256,
            max_connections: 256,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl ServerConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and parse a TOML config file.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.channel_capacity == 0 {
            return Err(ServerError::Config("channel_capacity must be positive".into()));
        }
        if self.max_connections == 0 {
            return Err(ServerError::Config("max_connections must be positive".into()));
        }
        if self.max_connections > Semaphore::MAX_PERMITS {
            return Err(ServerError::Config(format!(
                "max_connections must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.max_frame_size == 0 {
            return Err(ServerError::Config("max_frame_size must be positive".into()));
        }
        if self.max_frame_size > MAX_CONFIGURABLE_FRAME {
            return Err(ServerError::Config(format!(
                "max_frame_size must not exceed {MAX_CONFIGURABLE_FRAME}"
            )));
        }
        if !self.bus.object_path.starts_with('/') {
            return Err(ServerError::Config(format!(
                "object path {:?} must start with '/'",
                self.bus.object_path
            )));
        }
        if self.bus.interface.is_empty() {
            return Err(ServerError::Config("interface must not be empty".into()));
        }
        Ok(())
    }
}
