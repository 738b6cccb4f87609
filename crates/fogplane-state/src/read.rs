//! Repository interface shared by read snapshots and write transactions.
//!
//! Implementors provide two raw primitives (point lookup and prefix scan);
//! every typed lookup is derived from them, so the same queries run inside
//! and outside a unit of work.

use redb::ReadableTable;
use serde::de::DeserializeOwned;

use fogplane_core::UserId;

use crate::error::StateResult;
use crate::tables::*;
use crate::types::*;

/// Typed read access to every entity table.
pub trait StateRead {
    /// Raw value stored under `key`, if any.
    fn get_raw(&self, table: JsonTable, key: &str) -> StateResult<Option<Vec<u8>>>;

    /// Raw values of every row whose key starts with `prefix`, in key order.
    fn scan_raw(&self, table: JsonTable, prefix: &str) -> StateResult<Vec<Vec<u8>>>;

    fn get_json<T: DeserializeOwned>(&self, table: JsonTable, key: &str) -> StateResult<Option<T>> {
        self.get_raw(table, key)?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(map_err!(Deserialize)))
            .transpose()
    }

    fn scan_json<T: DeserializeOwned>(&self, table: JsonTable, prefix: &str) -> StateResult<Vec<T>> {
        self.scan_raw(table, prefix)?
            .iter()
            .map(|bytes| serde_json::from_slice(bytes).map_err(map_err!(Deserialize)))
            .collect()
    }

    // ── Microservices ──────────────────────────────────────────────

    fn microservice(&self, uuid: &str) -> StateResult<Option<Microservice>> {
        self.get_json(MICROSERVICES, uuid)
    }

    fn microservices(&self) -> StateResult<Vec<Microservice>> {
        self.scan_json(MICROSERVICES, "")
    }

    /// User microservices owned by `user_id` (network microservices excluded).
    fn microservices_for_user(&self, user_id: UserId) -> StateResult<Vec<Microservice>> {
        Ok(self
            .microservices()?
            .into_iter()
            .filter(|m| m.user_id == Some(user_id))
            .collect())
    }

    fn microservices_on_fog(&self, fog_uuid: &str) -> StateResult<Vec<Microservice>> {
        Ok(self
            .microservices()?
            .into_iter()
            .filter(|m| m.iofog_uuid.as_deref() == Some(fog_uuid))
            .collect())
    }

    fn ports_for(&self, microservice_uuid: &str) -> StateResult<Vec<PortMapping>> {
        self.scan_json(PORTS, &format!("{microservice_uuid}:"))
    }

    fn volumes_for(&self, microservice_uuid: &str) -> StateResult<Vec<VolumeMapping>> {
        self.scan_json(VOLUMES, &format!("{microservice_uuid}:"))
    }

    /// Resolve ports, volumes and outbound routes of a microservice.
    fn microservice_details(&self, microservice: Microservice) -> StateResult<MicroserviceDetails> {
        let ports = self.ports_for(&microservice.uuid)?;
        let volume_mappings = self.volumes_for(&microservice.uuid)?;
        let routes = self
            .routings_from(&microservice.uuid)?
            .into_iter()
            .map(|r| r.dest_microservice_uuid)
            .collect();
        Ok(MicroserviceDetails {
            microservice,
            ports,
            volume_mappings,
            routes,
        })
    }

    // ── Fogs ───────────────────────────────────────────────────────

    fn fog(&self, uuid: &str) -> StateResult<Option<Fog>> {
        self.get_json(FOGS, uuid)
    }

    fn fogs(&self) -> StateResult<Vec<Fog>> {
        self.scan_json(FOGS, "")
    }

    /// The fog an agent token belongs to.
    fn fog_by_token(&self, token: &str) -> StateResult<Option<Fog>> {
        match self.get_json::<FogAccessToken>(FOG_ACCESS_TOKENS, token)? {
            Some(access) => self.fog(&access.fog_uuid),
            None => Ok(None),
        }
    }

    fn fog_access_tokens(&self) -> StateResult<Vec<FogAccessToken>> {
        self.scan_json(FOG_ACCESS_TOKENS, "")
    }

    // ── Catalog ────────────────────────────────────────────────────

    fn catalog_item(&self, id: u64) -> StateResult<Option<CatalogItem>> {
        self.get_json(CATALOG_ITEMS, &id_key(id))
    }

    fn catalog_items(&self) -> StateResult<Vec<CatalogItem>> {
        self.scan_json(CATALOG_ITEMS, "")
    }

    fn catalog_item_images(&self, id: u64) -> StateResult<Vec<CatalogItemImage>> {
        self.scan_json(CATALOG_ITEM_IMAGES, &format!("{}:", id_key(id)))
    }

    /// Attach images and io types to a catalog item row.
    fn catalog_item_details(&self, item: CatalogItem) -> StateResult<CatalogItemDetails> {
        let key = item.table_key();
        let images = self.catalog_item_images(item.id)?;
        let input_type = self.get_json(CATALOG_ITEM_INPUT_TYPES, &key)?;
        let output_type = self.get_json(CATALOG_ITEM_OUTPUT_TYPES, &key)?;
        Ok(CatalogItemDetails::assemble(item, images, input_type, output_type))
    }

    // ── Routings ───────────────────────────────────────────────────

    fn routing(&self, source_uuid: &str, dest_uuid: &str) -> StateResult<Option<Routing>> {
        self.get_json(ROUTINGS, &Routing::key_for(source_uuid, dest_uuid))
    }

    fn routings(&self) -> StateResult<Vec<Routing>> {
        self.scan_json(ROUTINGS, "")
    }

    /// Routings whose source is `microservice_uuid`.
    fn routings_from(&self, microservice_uuid: &str) -> StateResult<Vec<Routing>> {
        self.scan_json(ROUTINGS, &format!("{microservice_uuid}:"))
    }

    /// Routings with `microservice_uuid` as either endpoint.
    fn routings_touching(&self, microservice_uuid: &str) -> StateResult<Vec<Routing>> {
        Ok(self
            .routings()?
            .into_iter()
            .filter(|r| {
                r.source_microservice_uuid == microservice_uuid
                    || r.dest_microservice_uuid == microservice_uuid
            })
            .collect())
    }

    /// Routings tunnelled through connector port `id`.
    fn routings_via_connector_port(&self, id: u64) -> StateResult<Vec<Routing>> {
        Ok(self
            .routings()?
            .into_iter()
            .filter(|r| r.connector_port_id == Some(id))
            .collect())
    }

    // ── Connector ports ────────────────────────────────────────────

    fn connector_port(&self, id: u64) -> StateResult<Option<ConnectorPort>> {
        self.get_json(CONNECTOR_PORTS, &id_key(id))
    }

    fn connector_ports(&self) -> StateResult<Vec<ConnectorPort>> {
        self.scan_json(CONNECTOR_PORTS, "")
    }

    /// The reservation serving the ordered fog pair, if one exists.
    fn connector_port_for_pair(
        &self,
        source_fog: &str,
        dest_fog: &str,
    ) -> StateResult<Option<ConnectorPort>> {
        Ok(self
            .connector_ports()?
            .into_iter()
            .find(|c| c.source_iofog_uuid == source_fog && c.dest_iofog_uuid == dest_fog))
    }
}

/// Point lookup against any readable JSON table.
pub(crate) fn read_value(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> StateResult<Option<Vec<u8>>> {
    Ok(table
        .get(key)
        .map_err(map_err!(Read))?
        .map(|guard| guard.value().to_vec()))
}

/// Prefix scan against any readable JSON table.
pub(crate) fn scan_prefix(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    prefix: &str,
) -> StateResult<Vec<Vec<u8>>> {
    let mut results = Vec::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (key, value) = entry.map_err(map_err!(Read))?;
        if key.value().starts_with(prefix) {
            results.push(value.value().to_vec());
        }
    }
    Ok(results)
}
