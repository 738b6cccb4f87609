//! fogplane-control — the routing and deployment consistency layer.
//!
//! Every mutating entry point runs as one unit of work on the
//! [`StateStore`](fogplane_state::StateStore): either all of its writes
//! (microservice, ports, volumes, routings, bridges, connector ports)
//! land, or none do.
//!
//! # Components
//!
//! - **`catalog`**: catalog items visible to a user (owned or public)
//! - **`mapping`**: port and volume mapping grammar
//! - **`microservice`**: create/update/delete with validation and access checks
//! - **`routing`**: routes, network bridges and connector-port reservations
//!
//! ```text
//! MicroserviceManager
//!   ├── CatalogResolver (visibility)
//!   ├── mapping (ports, volumes)
//!   └── RouteTopology
//!         ├── Direct routes (same fog)
//!         └── Bridged routes (bridge pair + connector port per fog pair)
//! ```

pub mod catalog;
pub mod error;
pub mod mapping;
pub mod microservice;
pub mod routing;
pub mod settings;

pub use catalog::{CatalogResolver, NewCatalogItem};
pub use error::{ControlError, ControlResult};
pub use mapping::{MappingError, PortSpec, VolumeSpec, parse_port, parse_volume};
pub use microservice::{MicroserviceManager, MicroserviceUpdate, NewMicroservice, resolve_root_access};
pub use routing::{RepairReport, RouteTopology};
pub use settings::ControlSettings;

/// Seconds since the Unix epoch, for record timestamps.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
