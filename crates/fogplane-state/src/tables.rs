//! redb table definitions for the fogplane state store.
//!
//! Each entity table uses `&str` keys and `&[u8]` values (JSON-serialized
//! records). Child rows use `{parent}:{child}` keys so a prefix scan finds
//! every row owned by one parent. Integer ids are zero-padded so their
//! keys sort numerically.

use redb::TableDefinition;

/// Shape shared by every entity table.
pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Microservices (user and network) keyed by `{uuid}`.
pub const MICROSERVICES: JsonTable = TableDefinition::new("microservices");

/// Fog nodes keyed by `{uuid}`.
pub const FOGS: JsonTable = TableDefinition::new("fogs");

/// Fog access tokens keyed by `{token}`.
pub const FOG_ACCESS_TOKENS: JsonTable = TableDefinition::new("fog_access_tokens");

/// Catalog items keyed by `{id}`.
pub const CATALOG_ITEMS: JsonTable = TableDefinition::new("catalog_items");

/// Catalog item images keyed by `{catalog_item_id}:{fog_type_id}`.
pub const CATALOG_ITEM_IMAGES: JsonTable = TableDefinition::new("catalog_item_images");

/// Catalog item input type keyed by `{catalog_item_id}`.
pub const CATALOG_ITEM_INPUT_TYPES: JsonTable = TableDefinition::new("catalog_item_input_types");

/// Catalog item output type keyed by `{catalog_item_id}`.
pub const CATALOG_ITEM_OUTPUT_TYPES: JsonTable =
    TableDefinition::new("catalog_item_output_types");

/// Routings keyed by `{source_microservice_uuid}:{dest_microservice_uuid}`.
///
/// The key doubles as the uniqueness constraint on the source+dest pair.
pub const ROUTINGS: JsonTable = TableDefinition::new("routings");

/// Port mappings keyed by `{microservice_uuid}:{id}`.
pub const PORTS: JsonTable = TableDefinition::new("ports");

/// Volume mappings keyed by `{microservice_uuid}:{id}`.
pub const VOLUMES: JsonTable = TableDefinition::new("volumes");

/// Reserved connector ports keyed by `{id}`.
pub const CONNECTOR_PORTS: JsonTable = TableDefinition::new("connector_ports");

/// Integer id sequences keyed by sequence name.
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

pub const CATALOG_ITEM_SEQ: &str = "catalog_items";
pub const ROUTING_SEQ: &str = "routings";
pub const PORT_SEQ: &str = "ports";
pub const VOLUME_SEQ: &str = "volumes";
pub const CONNECTOR_PORT_SEQ: &str = "connector_ports";

/// Key for a row identified by an integer id.
pub fn id_key(id: u64) -> String {
    format!("{id:020}")
}

/// Key for a child row owned by `parent`.
pub fn child_key(parent: &str, id: u64) -> String {
    format!("{parent}:{id:020}")
}
