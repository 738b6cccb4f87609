//! controller.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub store: StoreConfig,
    pub api: ApiConfig,
    pub connector: ConnectorConfig,
    pub bridge: BridgeConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
}

/// The connector that carries cross-node tunnels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Address advertised to network microservices.
    pub host: String,
    /// First port of the connector-port pool (inclusive).
    pub port_range_start: u16,
    /// Last port of the connector-port pool (inclusive).
    pub port_range_end: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Catalog item that network microservices are instantiated from.
    pub catalog_item_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_log_limit_mb: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("fogplane.redb"),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 51121 }
    }
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port_range_start: 50000,
            port_range_end: 50999,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { catalog_item_id: 1 }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_log_limit_mb: 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,fogplane=debug,fogctl=debug".to_string(),
            json: false,
        }
    }
}

impl ControllerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ControllerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise fall back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.connector.port_range_start == 0
            || self.connector.port_range_start > self.connector.port_range_end
        {
            anyhow::bail!(
                "invalid connector port range {}-{}",
                self.connector.port_range_start,
                self.connector.port_range_end
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let config = ControllerConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("port_range_start = 50000"));
        let parsed: ControllerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.api.port, 51121);
    }

    #[test]
    fn test_parse_partial() {
        let toml_str = r#"
[connector]
host = "connector.local"
port_range_start = 6000
port_range_end = 6010

[bridge]
catalog_item_id = 3
"#;
        let config: ControllerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.connector.host, "connector.local");
        assert_eq!(config.connector.port_range_end, 6010);
        assert_eq!(config.bridge.catalog_item_id, 3);
        assert_eq!(config.limits.max_log_limit_mb, 1024);
        assert_eq!(config.store.path, PathBuf::from("fogplane.redb"));
    }

    #[test]
    fn test_rejects_inverted_port_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("controller.toml");
        std::fs::write(
            &path,
            "[connector]\nport_range_start = 7000\nport_range_end = 6000\n",
        )
        .unwrap();
        assert!(ControllerConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_load_without_path_uses_defaults() {
        let config = ControllerConfig::load(None).unwrap();
        assert_eq!(config.bridge.catalog_item_id, 1);
    }
}
