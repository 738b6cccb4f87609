//! Port and volume mapping grammar.
//!
//! - port: `internal:external[:tunnel]`, e.g. `80:8080:false`
//! - volume: `hostPath:containerPath[:rw|ro]`, e.g. `/var/data:/data`
//!
//! [`parse_port`] and [`parse_volume`] are pure and judge one entry each.
//! [`parse_entries`] applies one of them to a list, logging and skipping
//! malformed entries so a single bad entry never fails the whole request.

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub internal: u16,
    pub external: u16,
    pub tunnel: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    pub host_destination: String,
    pub container_destination: String,
    pub access_mode: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("expected internal:external[:tunnel], got {0:?}")]
    PortShape(String),

    #[error("invalid port number {0:?}")]
    InvalidPort(String),

    #[error("invalid tunnel flag {0:?}, expected true or false")]
    InvalidTunnel(String),

    #[error("expected hostPath:containerPath[:rw|ro], got {0:?}")]
    VolumeShape(String),

    #[error("invalid access mode {0:?}, expected rw or ro")]
    InvalidAccessMode(String),
}

fn port_number(raw: &str) -> Result<u16, MappingError> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(MappingError::InvalidPort(raw.to_string())),
    }
}

/// Parse one port mapping entry.
pub fn parse_port(entry: &str) -> Result<PortSpec, MappingError> {
    let parts: Vec<&str> = entry.split(':').collect();
    let (internal, external, tunnel) = match parts.as_slice() {
        [internal, external] => (*internal, *external, None),
        [internal, external, tunnel] => (*internal, *external, Some(*tunnel)),
        _ => return Err(MappingError::PortShape(entry.to_string())),
    };
    let tunnel = match tunnel.map(str::trim) {
        None => false,
        Some(raw) => raw
            .parse::<bool>()
            .map_err(|_| MappingError::InvalidTunnel(raw.to_string()))?,
    };
    Ok(PortSpec {
        internal: port_number(internal)?,
        external: port_number(external)?,
        tunnel,
    })
}

/// Parse one volume mapping entry.
pub fn parse_volume(entry: &str) -> Result<VolumeSpec, MappingError> {
    let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
    let (host, container, mode) = match parts.as_slice() {
        [host, container] => (*host, *container, "rw"),
        [host, container, mode] => (*host, *container, *mode),
        _ => return Err(MappingError::VolumeShape(entry.to_string())),
    };
    if host.is_empty() || container.is_empty() {
        return Err(MappingError::VolumeShape(entry.to_string()));
    }
    if mode != "rw" && mode != "ro" {
        return Err(MappingError::InvalidAccessMode(mode.to_string()));
    }
    Ok(VolumeSpec {
        host_destination: host.to_string(),
        container_destination: container.to_string(),
        access_mode: mode.to_string(),
    })
}

/// Parse every entry, keeping the valid ones.
///
/// `what` names the mapping kind in the warning emitted for each skipped entry.
pub fn parse_entries<T>(
    entries: &[String],
    what: &str,
    parse: impl Fn(&str) -> Result<T, MappingError>,
) -> Vec<T> {
    entries
        .iter()
        .filter_map(|entry| match parse(entry.as_str()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(%entry, error = %e, "skipping malformed {what} mapping");
                None
            }
        })
        .collect()
}
