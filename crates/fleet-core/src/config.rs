//! fleet.toml configuration parser.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::flatfile;
use crate::types::{HeartBeat, Node, NodeRole, epoch_millis};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub membership: MembershipConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_address")]
    pub address: SocketAddr,
    /// Client nodes submit work and never apply membership events.
    #[serde(default)]
    pub client: bool,
    /// Only meaningful on a client node.
    #[serde(default)]
    pub controlling_client: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipConfig {
    /// When false the membership protocol is inert on this node.
    #[serde(default = "default_true")]
    pub flatfile_enabled: bool,
    pub flatfile: Option<PathBuf>,
    #[serde(default)]
    pub peers: Vec<SocketAddr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// How long the controlling client may stay silent, e.g. "10s".
    #[serde(default = "default_client_timeout")]
    pub client_timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_interval")]
    pub interval: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            client: false,
            controlling_client: false,
        }
    }
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            flatfile_enabled: true,
            flatfile: None,
            peers: Vec::new(),
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            client_timeout: default_client_timeout(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: default_heartbeat_interval(),
        }
    }
}

impl FleetConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        let config: FleetConfig =
            toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> CoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Reject settings that would only fail later at runtime.
    pub fn validate(&self) -> CoreResult<()> {
        if self.client_timeout()?.is_zero() {
            return Err(CoreError::Config(
                "watchdog.client_timeout must be greater than zero".to_string(),
            ));
        }
        if self.heartbeat_interval()?.is_zero() {
            return Err(CoreError::Config(
                "heartbeat.interval must be greater than zero".to_string(),
            ));
        }
        if self.node.controlling_client && !self.node.client {
            return Err(CoreError::Config(
                "node.controlling_client requires node.client = true".to_string(),
            ));
        }
        Ok(())
    }

    pub fn client_timeout(&self) -> CoreResult<Duration> {
        parse_duration(&self.watchdog.client_timeout)
    }

    pub fn heartbeat_interval(&self) -> CoreResult<Duration> {
        parse_duration(&self.heartbeat.interval)
    }

    /// Peers from the flatfile (if any) merged with the inline `peers` list.
    ///
    /// The local address is never part of the result.
    pub fn resolve_peers(&self) -> CoreResult<Vec<SocketAddr>> {
        let mut peers = match &self.membership.flatfile {
            Some(path) => flatfile::read_flatfile(path)?,
            None => Vec::new(),
        };
        for peer in &self.membership.peers {
            if !peers.contains(peer) {
                peers.push(*peer);
            }
        }
        peers.retain(|p| *p != self.node.address);
        Ok(peers)
    }

    /// The registry entry describing this process.
    pub fn local_node(&self) -> Node {
        let role = if self.node.client {
            NodeRole::Client
        } else {
            NodeRole::Compute
        };
        Node {
            address: self.node.address,
            role,
            heartbeat: HeartBeat {
                controlling_client: self.node.client && self.node.controlling_client,
                cpus: std::thread::available_parallelism()
                    .map(|n| n.get() as u32)
                    .unwrap_or(1),
                free_memory_bytes: 0,
                cloud_size: 0,
                build_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            last_heard_from: epoch_millis(),
        }
    }
}

/// Parse "500ms", "5s" or "2m".
pub fn parse_duration(s: &str) -> CoreResult<Duration> {
    let s = s.trim();
    let invalid = || CoreError::Duration(s.to_string());

    let (digits, millis_per_unit) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1_000)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60_000)
    } else {
        return Err(invalid());
    };

    let value = digits.trim().parse::<u64>().map_err(|_| invalid())?;
    Ok(Duration::from_millis(value.saturating_mul(millis_per_unit)))
}

fn default_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 54321))
}

fn default_true() -> bool {
    true
}

fn default_client_timeout() -> String {
    "10s".to_string()
}

fn default_heartbeat_interval() -> String {
    "1s".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = FleetConfig::from_toml_str("").unwrap();
        assert_eq!(config.node.address, default_address());
        assert!(!config.node.client);
        assert!(config.membership.flatfile_enabled);
        assert_eq!(config.client_timeout().unwrap(), Duration::from_secs(10));
        assert_eq!(config.heartbeat_interval().unwrap(), Duration::from_secs(1));
    }

    #[test]
    fn test_parse_full() {
        let toml_str = r#"
[node]
address = "10.0.0.1:54321"
client = true
controlling_client = true

[membership]
flatfile_enabled = false
peers = ["10.0.0.2:54321", "10.0.0.3:54321"]

[watchdog]
client_timeout = "5000ms"

[heartbeat]
interval = "2s"
"#;
        let config = FleetConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.node.address, "10.0.0.1:54321".parse().unwrap());
        assert!(config.node.client);
        assert!(!config.membership.flatfile_enabled);
        assert_eq!(config.membership.peers.len(), 2);
        assert_eq!(config.client_timeout().unwrap(), Duration::from_millis(5000));

        let local = config.local_node();
        assert!(local.is_client());
        assert!(local.is_controlling_client());
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let err = FleetConfig::from_toml_str("[watchdog]\nclient_timeout = \"soon\"\n").unwrap_err();
        assert!(matches!(err, CoreError::Duration(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = FleetConfig::from_toml_str("[watchdog]\nclient_timeout = \"0s\"\n").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_controlling_requires_client() {
        let err = FleetConfig::from_toml_str("[node]\ncontrolling_client = true\n").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration(" 5s ").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert!(parse_duration("5").is_err());
        assert!(parse_duration("ms").is_err());
    }

    #[test]
    fn test_resolve_peers_merges_flatfile() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# seed nodes").unwrap();
        writeln!(file, "10.0.0.1:54321").unwrap();
        writeln!(file, "10.0.0.2:54321").unwrap();

        let mut config = FleetConfig::default();
        config.node.address = "10.0.0.1:54321".parse().unwrap();
        config.membership.flatfile = Some(file.path().to_path_buf());
        config.membership.peers = vec![
            "10.0.0.2:54321".parse().unwrap(),
            "10.0.0.3:54321".parse().unwrap(),
        ];

        let peers = config.resolve_peers().unwrap();
        assert_eq!(
            peers,
            vec![
                "10.0.0.2:54321".parse::<SocketAddr>().unwrap(),
                "10.0.0.3:54321".parse().unwrap(),
            ]
        );
    }

    #[test]
    fn test_round_trip_through_file() {
        let mut config = FleetConfig::default();
        config.watchdog.client_timeout = "3s".to_string();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes()).unwrap();

        let loaded = FleetConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.client_timeout().unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn test_missing_file() {
        let err = FleetConfig::from_file(Path::new("/nonexistent/fleet.toml")).unwrap_err();
        assert!(matches!(err, CoreError::Io { .. }));
    }
}
