//! Runtime settings of the control core, derived from `controller.toml`.

use std::ops::RangeInclusive;

use fogplane_core::ControllerConfig;

#[derive(Debug, Clone)]
pub struct ControlSettings {
    /// Connector address written into bridge configs.
    pub connector_host: String,
    /// Pool connector ports are reserved from.
    pub connector_ports: RangeInclusive<u16>,
    /// Catalog item network microservices are created from.
    pub bridge_catalog_item_id: u64,
    pub max_log_limit_mb: u32,
}

impl From<&ControllerConfig> for ControlSettings {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            connector_host: config.connector.host.clone(),
            connector_ports: config.connector.port_range_start..=config.connector.port_range_end,
            bridge_catalog_item_id: config.bridge.catalog_item_id,
            max_log_limit_mb: config.limits.max_log_limit_mb,
        }
    }
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self::from(&ControllerConfig::default())
    }
}
