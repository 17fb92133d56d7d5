use std::net::Ipv4Addr;
use std::path::Path;

use anyhow::{Context, Result};
use ipnetwork::{IpNetwork, Ipv4Network};
use serde::{Deserialize, Serialize};

use crate::capture::CaptureConfig;
use crate::export::ExportConfig;
use crate::flow::FlowConfig;
use crate::geo::GeoConfig;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub flow: FlowConfig,

    #[serde(default)]
    pub geo: GeoConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Local network definition used for direction classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// CIDR range considered "local"
    #[serde(default = "default_local_network")]
    pub local_network: IpNetwork,
}

fn default_local_network() -> IpNetwork {
    // 192.168.1.0/24; the prefix is statically valid
    IpNetwork::V4(
        Ipv4Network::new(Ipv4Addr::new(192, 168, 1, 0), 24).expect("valid default prefix"),
    )
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            local_network: default_local_network(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load config from the given path, or fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.local_network.to_string(), "192.168.1.0/24");
        assert_eq!(config.flow.max_flows, 0);
        assert!(config.flow.session_idle_timeout_secs.is_none());
        assert_eq!(config.export.rotate_secs, 900);
        assert!(config.geo.enabled);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [network]
            local_network = "10.0.0.0/8"

            [flow]
            max_flows = 5000
            session_idle_timeout_secs = 300.0

            [geo]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.network.local_network.to_string(), "10.0.0.0/8");
        assert_eq!(config.flow.max_flows, 5000);
        assert_eq!(config.flow.session_idle_timeout_secs, Some(300.0));
        assert!(!config.geo.enabled);
        // Untouched sections keep their defaults
        assert_eq!(config.export.rotate_secs, 900);
    }
}
