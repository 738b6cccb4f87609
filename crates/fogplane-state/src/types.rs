//! Records persisted by the fogplane state store.
//!
//! Row types mirror one table each. `MicroserviceDetails` and
//! `CatalogItemDetails` are the assembled views with their nested
//! collections resolved, as returned across the data-access boundary.

use fogplane_core::{CatalogItemId, FogUuid, MicroserviceUuid, UserId};
use serde::{Deserialize, Serialize};

use crate::tables::{child_key, id_key};

// ── Microservice ──────────────────────────────────────────────────

/// A containerized workload placed on a fog node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Microservice {
    pub uuid: MicroserviceUuid,
    pub name: String,
    /// Owning user. `None` for network microservices, which the controller owns.
    pub user_id: Option<UserId>,
    pub catalog_item_id: CatalogItemId,
    pub flow_id: Option<u64>,
    /// Hosting fog. Nulled when the fog is deleted.
    pub iofog_uuid: Option<FogUuid>,
    /// Opaque configuration blob handed to the container.
    pub config: String,
    pub root_host_access: bool,
    /// Log file size limit in MB.
    pub log_limit: u32,
    /// Set for bridge proxies provisioned by the route topology.
    pub is_network: bool,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Container port exposed on the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub id: u64,
    pub microservice_uuid: MicroserviceUuid,
    pub internal: u16,
    pub external: u16,
    pub tunnel: bool,
}

/// Host directory mounted into the container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMapping {
    pub id: u64,
    pub microservice_uuid: MicroserviceUuid,
    pub host_destination: String,
    pub container_destination: String,
    pub access_mode: String,
}

/// A microservice with its ports, volumes and outbound route targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MicroserviceDetails {
    #[serde(flatten)]
    pub microservice: Microservice,
    pub ports: Vec<PortMapping>,
    pub volume_mappings: Vec<VolumeMapping>,
    /// Destination microservice UUIDs of outbound routes.
    pub routes: Vec<MicroserviceUuid>,
}

// ── Fog ───────────────────────────────────────────────────────────

/// An edge host that runs microservices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Fog {
    pub uuid: FogUuid,
    pub name: String,
    /// Owning user, `None` for shared nodes.
    pub user_id: Option<UserId>,
    /// Node architecture, matched against catalog item images.
    pub fog_type_id: u32,
    pub created_at: u64,
}

/// Token an agent presents to identify its fog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FogAccessToken {
    pub token: String,
    pub fog_uuid: FogUuid,
}

// ── Catalog ───────────────────────────────────────────────────────

/// Catalog item row. `user_id = None` makes the item public.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: CatalogItemId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub publisher: String,
    pub disk_required: u64,
    pub ram_required: u64,
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItemImage {
    pub catalog_item_id: CatalogItemId,
    pub fog_type_id: u32,
    pub container_image: String,
}

/// Input or output descriptor of a catalog item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItemIoType {
    pub catalog_item_id: CatalogItemId,
    pub info_type: String,
    pub info_format: String,
}

/// Image variant as exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub container_image: String,
    pub fog_type_id: u32,
}

/// Input/output descriptor as exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IoTypeInfo {
    pub info_type: String,
    pub info_format: String,
}

/// A catalog item with nested images and io types. Carries no owner field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItemDetails {
    pub id: CatalogItemId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub publisher: String,
    pub disk_required: u64,
    pub ram_required: u64,
    pub images: Vec<ImageInfo>,
    pub input_type: Option<IoTypeInfo>,
    pub output_type: Option<IoTypeInfo>,
}

// ── Routing ───────────────────────────────────────────────────────

/// A data route from one microservice to another.
///
/// Cross-node routings carry the bridge pair, both fog UUIDs and the
/// connector port; same-node routings carry none of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Routing {
    pub id: u64,
    pub is_network_connection: bool,
    pub source_microservice_uuid: MicroserviceUuid,
    pub dest_microservice_uuid: MicroserviceUuid,
    pub source_network_microservice_uuid: Option<MicroserviceUuid>,
    pub dest_network_microservice_uuid: Option<MicroserviceUuid>,
    pub source_iofog_uuid: Option<FogUuid>,
    pub dest_iofog_uuid: Option<FogUuid>,
    pub connector_port_id: Option<u64>,
}

/// Connector port reserved for the tunnel between an ordered fog pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorPort {
    pub id: u64,
    pub port: u16,
    pub source_iofog_uuid: FogUuid,
    pub dest_iofog_uuid: FogUuid,
    /// Bridge on the source fog. Nulled if the bridge is deleted.
    pub source_network_microservice_uuid: Option<MicroserviceUuid>,
    /// Bridge on the dest fog. Nulled if the bridge is deleted.
    pub dest_network_microservice_uuid: Option<MicroserviceUuid>,
}

impl PortMapping {
    pub fn table_key(&self) -> String {
        child_key(&self.microservice_uuid, self.id)
    }
}

impl VolumeMapping {
    pub fn table_key(&self) -> String {
        child_key(&self.microservice_uuid, self.id)
    }
}

impl CatalogItem {
    pub fn table_key(&self) -> String {
        id_key(self.id)
    }

    /// Visible if owned by `user_id` or public.
    pub fn is_visible_to(&self, user_id: UserId) -> bool {
        self.user_id.is_none_or(|owner| owner == user_id)
    }
}

impl CatalogItemImage {
    pub fn table_key(&self) -> String {
        format!("{}:{}", id_key(self.catalog_item_id), self.fog_type_id)
    }
}

impl Routing {
    /// Build the composite key for the routings table.
    pub fn key_for(source: &str, dest: &str) -> String {
        format!("{source}:{dest}")
    }

    pub fn table_key(&self) -> String {
        Self::key_for(&self.source_microservice_uuid, &self.dest_microservice_uuid)
    }

    /// A cross-node routing that lost a bridge, fog or connector reference.
    pub fn needs_repair(&self) -> bool {
        self.is_network_connection
            && (self.source_network_microservice_uuid.is_none()
                || self.dest_network_microservice_uuid.is_none()
                || self.source_iofog_uuid.is_none()
                || self.dest_iofog_uuid.is_none()
                || self.connector_port_id.is_none())
    }
}

impl ConnectorPort {
    pub fn table_key(&self) -> String {
        id_key(self.id)
    }
}

impl CatalogItemDetails {
    pub fn assemble(
        item: CatalogItem,
        images: Vec<CatalogItemImage>,
        input_type: Option<CatalogItemIoType>,
        output_type: Option<CatalogItemIoType>,
    ) -> Self {
        let io = |t: CatalogItemIoType| IoTypeInfo {
            info_type: t.info_type,
            info_format: t.info_format,
        };
        Self {
            id: item.id,
            name: item.name,
            description: item.description,
            category: item.category,
            publisher: item.publisher,
            disk_required: item.disk_required,
            ram_required: item.ram_required,
            images: images
                .into_iter()
                .map(|i| ImageInfo {
                    container_image: i.container_image,
                    fog_type_id: i.fog_type_id,
                })
                .collect(),
            input_type: input_type.map(io),
            output_type: output_type.map(io),
        }
    }
}
