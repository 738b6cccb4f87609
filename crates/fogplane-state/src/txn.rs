//! StateTxn: one redb write transaction spanning every table.
//!
//! All mutations go through a `StateTxn` handed out by
//! [`StateStore::transaction`](crate::StateStore::transaction). The
//! foreign-key policies of the schema are applied here: microservice
//! endpoints cascade, fog/bridge/connector references are set to null.

use redb::{ReadableTable, WriteTransaction};
use serde::Serialize;
use tracing::debug;

use crate::error::StateResult;
use crate::read::{StateRead, read_value, scan_prefix};
use crate::tables::*;
use crate::types::*;

/// A unit of work against the state store.
pub struct StateTxn {
    txn: WriteTransaction,
}

impl StateRead for StateTxn {
    fn get_raw(&self, table: JsonTable, key: &str) -> StateResult<Option<Vec<u8>>> {
        let table = self.txn.open_table(table).map_err(map_err!(Table))?;
        read_value(&table, key)
    }

    fn scan_raw(&self, table: JsonTable, prefix: &str) -> StateResult<Vec<Vec<u8>>> {
        let table = self.txn.open_table(table).map_err(map_err!(Table))?;
        scan_prefix(&table, prefix)
    }
}

impl StateTxn {
    pub(crate) fn new(txn: WriteTransaction) -> Self {
        Self { txn }
    }

    pub(crate) fn commit(self) -> StateResult<()> {
        self.txn.commit().map_err(map_err!(Aborted))
    }

    pub(crate) fn abort(self) -> StateResult<()> {
        self.txn.abort().map_err(map_err!(Aborted))
    }

    fn put_json<T: Serialize>(&self, table: JsonTable, key: &str, value: &T) -> StateResult<()> {
        let value = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let mut table = self.txn.open_table(table).map_err(map_err!(Table))?;
        table
            .insert(key, value.as_slice())
            .map_err(map_err!(Write))?;
        Ok(())
    }

    fn remove(&self, table: JsonTable, key: &str) -> StateResult<bool> {
        let mut table = self.txn.open_table(table).map_err(map_err!(Table))?;
        let existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        Ok(existed)
    }

    /// Allocate the next integer id of a sequence (ids start at 1).
    pub fn next_id(&self, sequence: &str) -> StateResult<u64> {
        let mut table = self.txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        let next = match table.get(sequence).map_err(map_err!(Read))? {
            Some(guard) => guard.value() + 1,
            None => 1,
        };
        table.insert(sequence, next).map_err(map_err!(Write))?;
        Ok(next)
    }

    // ── Microservices ──────────────────────────────────────────────

    /// Insert or update a microservice row.
    pub fn put_microservice(&self, microservice: &Microservice) -> StateResult<()> {
        self.put_json(MICROSERVICES, &microservice.uuid, microservice)?;
        debug!(uuid = %microservice.uuid, "microservice stored");
        Ok(())
    }

    /// Delete a microservice and apply the foreign-key policies.
    ///
    /// Ports, volumes and routings that use it as an endpoint are deleted.
    /// Routings and connector ports that use it as a bridge get the
    /// reference nulled. Returns true if it existed.
    pub fn delete_microservice(&self, uuid: &str) -> StateResult<bool> {
        let existed = self.remove(MICROSERVICES, uuid)?;
        let ports = self.delete_ports_for(uuid)?;
        let volumes = self.delete_volumes_for(uuid)?;

        let mut routes_removed = 0u32;
        for mut routing in self.routings()? {
            if routing.source_microservice_uuid == uuid || routing.dest_microservice_uuid == uuid {
                self.remove(ROUTINGS, &routing.table_key())?;
                routes_removed += 1;
                continue;
            }
            let mut changed = false;
            if routing.source_network_microservice_uuid.as_deref() == Some(uuid) {
                routing.source_network_microservice_uuid = None;
                changed = true;
            }
            if routing.dest_network_microservice_uuid.as_deref() == Some(uuid) {
                routing.dest_network_microservice_uuid = None;
                changed = true;
            }
            if changed {
                self.put_routing(&routing)?;
            }
        }

        for mut connector in self.connector_ports()? {
            let mut changed = false;
            if connector.source_network_microservice_uuid.as_deref() == Some(uuid) {
                connector.source_network_microservice_uuid = None;
                changed = true;
            }
            if connector.dest_network_microservice_uuid.as_deref() == Some(uuid) {
                connector.dest_network_microservice_uuid = None;
                changed = true;
            }
            if changed {
                self.put_connector_port(&connector)?;
            }
        }

        debug!(%uuid, existed, ports, volumes, routes_removed, "microservice deleted");
        Ok(existed)
    }

    pub fn insert_port(
        &self,
        microservice_uuid: &str,
        internal: u16,
        external: u16,
        tunnel: bool,
    ) -> StateResult<PortMapping> {
        let port = PortMapping {
            id: self.next_id(PORT_SEQ)?,
            microservice_uuid: microservice_uuid.to_string(),
            internal,
            external,
            tunnel,
        };
        self.put_json(PORTS, &port.table_key(), &port)?;
        Ok(port)
    }

    /// Delete every port of a microservice. Returns the number deleted.
    pub fn delete_ports_for(&self, microservice_uuid: &str) -> StateResult<u32> {
        let ports = self.ports_for(microservice_uuid)?;
        for port in &ports {
            self.remove(PORTS, &port.table_key())?;
        }
        Ok(ports.len() as u32)
    }

    pub fn insert_volume(
        &self,
        microservice_uuid: &str,
        host_destination: &str,
        container_destination: &str,
        access_mode: &str,
    ) -> StateResult<VolumeMapping> {
        let volume = VolumeMapping {
            id: self.next_id(VOLUME_SEQ)?,
            microservice_uuid: microservice_uuid.to_string(),
            host_destination: host_destination.to_string(),
            container_destination: container_destination.to_string(),
            access_mode: access_mode.to_string(),
        };
        self.put_json(VOLUMES, &volume.table_key(), &volume)?;
        Ok(volume)
    }

    /// Delete every volume of a microservice. Returns the number deleted.
    pub fn delete_volumes_for(&self, microservice_uuid: &str) -> StateResult<u32> {
        let volumes = self.volumes_for(microservice_uuid)?;
        for volume in &volumes {
            self.remove(VOLUMES, &volume.table_key())?;
        }
        Ok(volumes.len() as u32)
    }

    // ── Fogs ───────────────────────────────────────────────────────

    pub fn put_fog(&self, fog: &Fog) -> StateResult<()> {
        self.put_json(FOGS, &fog.uuid, fog)
    }

    pub fn put_fog_access_token(&self, access: &FogAccessToken) -> StateResult<()> {
        self.put_json(FOG_ACCESS_TOKENS, &access.token, access)
    }

    /// Delete a fog. Hosted microservices and routings keep their rows
    /// with the fog reference nulled; access tokens are dropped.
    pub fn delete_fog(&self, uuid: &str) -> StateResult<bool> {
        let existed = self.remove(FOGS, uuid)?;

        for access in self.fog_access_tokens()? {
            if access.fog_uuid == uuid {
                self.remove(FOG_ACCESS_TOKENS, &access.token)?;
            }
        }

        for mut microservice in self.microservices_on_fog(uuid)? {
            microservice.iofog_uuid = None;
            self.put_microservice(&microservice)?;
        }

        for mut routing in self.routings()? {
            let mut changed = false;
            if routing.source_iofog_uuid.as_deref() == Some(uuid) {
                routing.source_iofog_uuid = None;
                changed = true;
            }
            if routing.dest_iofog_uuid.as_deref() == Some(uuid) {
                routing.dest_iofog_uuid = None;
                changed = true;
            }
            if changed {
                self.put_routing(&routing)?;
            }
        }

        debug!(%uuid, existed, "fog deleted");
        Ok(existed)
    }

    // ── Catalog ────────────────────────────────────────────────────

    pub fn put_catalog_item(&self, item: &CatalogItem) -> StateResult<()> {
        self.put_json(CATALOG_ITEMS, &item.table_key(), item)
    }

    pub fn put_catalog_item_image(&self, image: &CatalogItemImage) -> StateResult<()> {
        self.put_json(CATALOG_ITEM_IMAGES, &image.table_key(), image)
    }

    pub fn put_catalog_item_input_type(&self, io: &CatalogItemIoType) -> StateResult<()> {
        self.put_json(CATALOG_ITEM_INPUT_TYPES, &id_key(io.catalog_item_id), io)
    }

    pub fn put_catalog_item_output_type(&self, io: &CatalogItemIoType) -> StateResult<()> {
        self.put_json(CATALOG_ITEM_OUTPUT_TYPES, &id_key(io.catalog_item_id), io)
    }

    // ── Routings ───────────────────────────────────────────────────

    /// Insert a routing, assigning it a fresh id.
    pub fn insert_routing(&self, mut routing: Routing) -> StateResult<Routing> {
        routing.id = self.next_id(ROUTING_SEQ)?;
        self.put_routing(&routing)?;
        Ok(routing)
    }

    pub fn put_routing(&self, routing: &Routing) -> StateResult<()> {
        self.put_json(ROUTINGS, &routing.table_key(), routing)
    }

    /// Delete the routing between two microservices, returning it if it existed.
    pub fn delete_routing(&self, source_uuid: &str, dest_uuid: &str) -> StateResult<Option<Routing>> {
        let routing = self.routing(source_uuid, dest_uuid)?;
        if let Some(routing) = &routing {
            self.remove(ROUTINGS, &routing.table_key())?;
        }
        Ok(routing)
    }

    // ── Connector ports ────────────────────────────────────────────

    /// Reserve `port` for the tunnel between an ordered fog pair.
    pub fn insert_connector_port(
        &self,
        port: u16,
        source_iofog_uuid: &str,
        dest_iofog_uuid: &str,
    ) -> StateResult<ConnectorPort> {
        let connector = ConnectorPort {
            id: self.next_id(CONNECTOR_PORT_SEQ)?,
            port,
            source_iofog_uuid: source_iofog_uuid.to_string(),
            dest_iofog_uuid: dest_iofog_uuid.to_string(),
            source_network_microservice_uuid: None,
            dest_network_microservice_uuid: None,
        };
        self.put_connector_port(&connector)?;
        Ok(connector)
    }

    pub fn put_connector_port(&self, connector: &ConnectorPort) -> StateResult<()> {
        self.put_json(CONNECTOR_PORTS, &connector.table_key(), connector)
    }

    /// Release a connector port; routings referencing it get the reference nulled.
    pub fn delete_connector_port(&self, id: u64) -> StateResult<bool> {
        let existed = self.remove(CONNECTOR_PORTS, &id_key(id))?;
        for mut routing in self.routings_via_connector_port(id)? {
            routing.connector_port_id = None;
            self.put_routing(&routing)?;
        }
        Ok(existed)
    }
}
