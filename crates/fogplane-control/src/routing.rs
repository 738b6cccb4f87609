//! Route topology: routings, network bridges and connector ports.
//!
//! A route between two microservices on the same fog is `Direct`: one
//! routing row with no bridge, fog or connector fields. A route across
//! fogs is `Bridged`: it is tunnelled through a connector port by a pair
//! of network microservices, one on the source fog (into the tunnel) and
//! one on the dest fog (out of the tunnel).
//!
//! One bridge pair and one connector port serve an ordered fog pair and
//! are shared by every route crossing it. They are torn down when the last
//! such route goes away; the reference count is the number of routings
//! pointing at the connector port.
//!
//! The `*_in` variants run inside a caller's [`StateTxn`]; the reserve-or-
//! reuse lookup and the bridge writes share one serializable transaction,
//! so concurrent callers never provision duplicate bridges.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use fogplane_core::FogUuid;
use fogplane_state::{ConnectorPort, Microservice, Routing, StateRead, StateStore, StateTxn};

use crate::epoch_secs;
use crate::error::{ControlError, ControlResult};
use crate::settings::ControlSettings;

/// Log limit given to network microservices, in MB.
const BRIDGE_LOG_LIMIT_MB: u32 = 50;

/// Which end of the tunnel a network microservice serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BridgeSide {
    /// On the source fog, forwarding into the tunnel.
    Source,
    /// On the dest fog, forwarding out of the tunnel to the destination.
    Dest,
}

impl BridgeSide {
    fn mode(self) -> &'static str {
        match self {
            BridgeSide::Source => "tunnel-in",
            BridgeSide::Dest => "tunnel-out",
        }
    }
}

/// Outcome of [`RouteTopology::repair_routes`].
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    /// `(source, dest)` pairs whose routing was re-provisioned.
    pub repaired: Vec<(String, String)>,
    /// `(source, dest, reason)` for routings that cannot be placed.
    pub unrepairable: Vec<(String, String, String)>,
}

/// Computes and mutates routings between microservices.
#[derive(Clone)]
pub struct RouteTopology {
    store: StateStore,
    settings: ControlSettings,
}

impl RouteTopology {
    pub fn new(store: StateStore, settings: ControlSettings) -> Self {
        Self { store, settings }
    }

    // ── Standalone units of work ───────────────────────────────────

    /// Add the route `source → dest` in its own unit of work.
    pub fn add_route(&self, source_uuid: &str, dest_uuid: &str) -> ControlResult<Routing> {
        self.store
            .transaction(|txn| self.add_route_in(txn, source_uuid, dest_uuid))
    }

    /// Remove the route `source → dest` in its own unit of work.
    pub fn remove_route(&self, source_uuid: &str, dest_uuid: &str) -> ControlResult<Routing> {
        self.store
            .transaction(|txn| self.remove_route_in(txn, source_uuid, dest_uuid))
    }

    /// Outbound routings of a microservice.
    pub fn routes_for(&self, microservice_uuid: &str) -> ControlResult<Vec<Routing>> {
        Ok(self.store.snapshot()?.routings_from(microservice_uuid)?)
    }

    /// Re-provision every routing whose stored topology no longer matches
    /// the placement of its endpoints.
    ///
    /// Each routing is repaired in its own unit of work, so one that cannot
    /// be placed is reported and left as it was without undoing the others.
    pub fn repair_routes(&self) -> ControlResult<RepairReport> {
        let mut report = RepairReport::default();
        for routing in self.store.snapshot()?.routings()? {
            let source = routing.source_microservice_uuid.clone();
            let dest = routing.dest_microservice_uuid.clone();
            let outcome = self.store.transaction(|txn| match txn.routing(&source, &dest)? {
                Some(current) => self.reconcile_in(txn, &current),
                None => Ok(false),
            });
            match outcome {
                Ok(true) => report.repaired.push((source, dest)),
                Ok(false) => {}
                Err(
                    e @ (ControlError::InconsistentRoute(_)
                    | ControlError::ConnectorPortsExhausted { .. }),
                ) => {
                    let reason = e.to_string();
                    warn!(%source, %dest, %reason, "route cannot be repaired");
                    report.unrepairable.push((source, dest, reason));
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            repaired = report.repaired.len(),
            unrepairable = report.unrepairable.len(),
            "route repair finished"
        );
        Ok(report)
    }

    // ── Transaction-scoped operations ──────────────────────────────

    /// Add `source → dest`. An existing route is returned unchanged.
    pub fn add_route_in(
        &self,
        txn: &StateTxn,
        source_uuid: &str,
        dest_uuid: &str,
    ) -> ControlResult<Routing> {
        if source_uuid == dest_uuid {
            return Err(ControlError::Validation(format!(
                "microservice {source_uuid} cannot route to itself"
            )));
        }
        if let Some(existing) = txn.routing(source_uuid, dest_uuid)? {
            debug!(source = %source_uuid, dest = %dest_uuid, "route already exists");
            return Ok(existing);
        }

        let (source_fog, dest_fog) = self.resolve_fogs(txn, source_uuid, dest_uuid)?;

        let routing = if source_fog == dest_fog {
            txn.insert_routing(direct(source_uuid, dest_uuid))?
        } else {
            let connector = self.provision_bridge(txn, &source_fog, &dest_fog)?;
            txn.insert_routing(Routing {
                id: 0,
                is_network_connection: true,
                source_microservice_uuid: source_uuid.to_string(),
                dest_microservice_uuid: dest_uuid.to_string(),
                source_network_microservice_uuid: connector.source_network_microservice_uuid,
                dest_network_microservice_uuid: connector.dest_network_microservice_uuid,
                source_iofog_uuid: Some(source_fog),
                dest_iofog_uuid: Some(dest_fog),
                connector_port_id: Some(connector.id),
            })?
        };

        info!(
            source = %source_uuid,
            dest = %dest_uuid,
            bridged = routing.is_network_connection,
            "route added"
        );
        Ok(routing)
    }

    /// Remove `source → dest`, releasing its bridge pair if it was the last user.
    pub fn remove_route_in(
        &self,
        txn: &StateTxn,
        source_uuid: &str,
        dest_uuid: &str,
    ) -> ControlResult<Routing> {
        let routing = txn.delete_routing(source_uuid, dest_uuid)?.ok_or_else(|| {
            ControlError::NotFound(format!("route {source_uuid} -> {dest_uuid}"))
        })?;
        self.release(txn, &routing)?;
        info!(source = %source_uuid, dest = %dest_uuid, "route removed");
        Ok(routing)
    }

    /// Bring every route touching `microservice_uuid` in line with its
    /// current placement. Called after the microservice moves to another fog.
    pub fn reconcile_microservice_in(
        &self,
        txn: &StateTxn,
        microservice_uuid: &str,
    ) -> ControlResult<u32> {
        let mut changed = 0;
        for routing in txn.routings_touching(microservice_uuid)? {
            match self.reconcile_in(txn, &routing) {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(ControlError::InconsistentRoute(reason)) => {
                    warn!(
                        source = %routing.source_microservice_uuid,
                        dest = %routing.dest_microservice_uuid,
                        %reason,
                        "route left degraded"
                    );
                    if self.degrade_in(txn, &routing)? {
                        changed += 1;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(changed)
    }

    /// Keep `routing` but drop the bridges, fogs and connector port it
    /// held. A bridged routing stays flagged so `repair_routes` picks it up
    /// once both endpoints are placed again. Returns true if anything was
    /// released.
    fn degrade_in(&self, txn: &StateTxn, routing: &Routing) -> ControlResult<bool> {
        let degraded = Routing {
            is_network_connection: routing.is_network_connection,
            ..direct_like(routing)
        };
        if &degraded == routing {
            return Ok(false);
        }
        txn.delete_routing(&routing.source_microservice_uuid, &routing.dest_microservice_uuid)?;
        self.release(txn, routing)?;
        txn.put_routing(&degraded)?;
        Ok(true)
    }

    /// Re-provision `routing` if it is out of line with placement.
    /// Returns true if it was rebuilt.
    fn reconcile_in(&self, txn: &StateTxn, routing: &Routing) -> ControlResult<bool> {
        let source = &routing.source_microservice_uuid;
        let dest = &routing.dest_microservice_uuid;
        let (source_fog, dest_fog) = self.resolve_fogs(txn, source, dest)?;
        if self.is_consistent(txn, routing, &source_fog, &dest_fog)? {
            return Ok(false);
        }

        let from = if routing.is_network_connection { "bridged" } else { "direct" };
        self.remove_route_in(txn, source, dest)?;
        let rebuilt = self.add_route_in(txn, source, dest)?;
        let to = if rebuilt.is_network_connection { "bridged" } else { "direct" };
        info!(%source, %dest, from, to, "route re-provisioned");
        Ok(true)
    }

    // ── Placement ──────────────────────────────────────────────────

    /// Current fogs of both endpoints.
    fn resolve_fogs(
        &self,
        txn: &StateTxn,
        source_uuid: &str,
        dest_uuid: &str,
    ) -> ControlResult<(FogUuid, FogUuid)> {
        Ok((
            self.placement(txn, source_uuid)?,
            self.placement(txn, dest_uuid)?,
        ))
    }

    fn placement(&self, txn: &StateTxn, microservice_uuid: &str) -> ControlResult<FogUuid> {
        let microservice = txn.microservice(microservice_uuid)?.ok_or_else(|| {
            ControlError::InconsistentRoute(format!(
                "microservice {microservice_uuid} no longer exists"
            ))
        })?;
        if microservice.is_network {
            return Err(ControlError::InconsistentRoute(format!(
                "network microservice {microservice_uuid} cannot be a route endpoint"
            )));
        }
        let fog_uuid = microservice.iofog_uuid.ok_or_else(|| {
            ControlError::InconsistentRoute(format!(
                "microservice {microservice_uuid} is not placed on a fog"
            ))
        })?;
        if txn.fog(&fog_uuid)?.is_none() {
            return Err(ControlError::InconsistentRoute(format!(
                "fog {fog_uuid} of microservice {microservice_uuid} no longer exists"
            )));
        }
        Ok(fog_uuid)
    }

    /// Whether `routing` matches the placement `source_fog → dest_fog`.
    fn is_consistent(
        &self,
        txn: &StateTxn,
        routing: &Routing,
        source_fog: &str,
        dest_fog: &str,
    ) -> ControlResult<bool> {
        if source_fog == dest_fog {
            return Ok(routing == &direct_like(routing));
        }
        if !routing.is_network_connection || routing.needs_repair() {
            return Ok(false);
        }
        if routing.source_iofog_uuid.as_deref() != Some(source_fog)
            || routing.dest_iofog_uuid.as_deref() != Some(dest_fog)
        {
            return Ok(false);
        }
        let Some(connector_id) = routing.connector_port_id else {
            return Ok(false);
        };
        let Some(connector) = txn.connector_port(connector_id)? else {
            return Ok(false);
        };
        if connector.source_iofog_uuid != source_fog
            || connector.dest_iofog_uuid != dest_fog
            || connector.source_network_microservice_uuid != routing.source_network_microservice_uuid
            || connector.dest_network_microservice_uuid != routing.dest_network_microservice_uuid
        {
            return Ok(false);
        }
        Ok(self.bridge_alive(txn, routing.source_network_microservice_uuid.as_deref())?
            && self.bridge_alive(txn, routing.dest_network_microservice_uuid.as_deref())?)
    }

    fn bridge_alive(&self, txn: &StateTxn, uuid: Option<&str>) -> ControlResult<bool> {
        Ok(match uuid {
            Some(uuid) => txn.microservice(uuid)?.is_some_and(|m| m.is_network),
            None => false,
        })
    }

    // ── Bridges ────────────────────────────────────────────────────

    /// Reuse the bridge pair of `source_fog → dest_fog`, or reserve a
    /// connector port and create one. Missing bridges of an existing
    /// reservation are recreated.
    fn provision_bridge(
        &self,
        txn: &StateTxn,
        source_fog: &str,
        dest_fog: &str,
    ) -> ControlResult<ConnectorPort> {
        let mut connector = match txn.connector_port_for_pair(source_fog, dest_fog)? {
            Some(existing) => {
                debug!(port = existing.port, %source_fog, %dest_fog, "reusing bridge pair");
                existing
            }
            None => {
                let port = self.allocate_port(txn)?;
                let connector = txn.insert_connector_port(port, source_fog, dest_fog)?;
                info!(port, %source_fog, %dest_fog, "connector port reserved");
                connector
            }
        };

        let mut changed = false;
        if !self.bridge_alive(txn, connector.source_network_microservice_uuid.as_deref())? {
            let uuid = self.create_bridge(txn, &connector, BridgeSide::Source)?;
            connector.source_network_microservice_uuid = Some(uuid);
            changed = true;
        }
        if !self.bridge_alive(txn, connector.dest_network_microservice_uuid.as_deref())? {
            let uuid = self.create_bridge(txn, &connector, BridgeSide::Dest)?;
            connector.dest_network_microservice_uuid = Some(uuid);
            changed = true;
        }
        if changed {
            txn.put_connector_port(&connector)?;
        }
        Ok(connector)
    }

    /// Lowest free port of the configured pool.
    fn allocate_port(&self, txn: &StateTxn) -> ControlResult<u16> {
        let used: HashSet<u16> = txn.connector_ports()?.iter().map(|c| c.port).collect();
        self.settings
            .connector_ports
            .clone()
            .find(|port| !used.contains(port))
            .ok_or_else(|| ControlError::ConnectorPortsExhausted {
                start: *self.settings.connector_ports.start(),
                end: *self.settings.connector_ports.end(),
            })
    }

    fn create_bridge(
        &self,
        txn: &StateTxn,
        connector: &ConnectorPort,
        side: BridgeSide,
    ) -> ControlResult<String> {
        let (local_fog, remote_fog) = match side {
            BridgeSide::Source => (&connector.source_iofog_uuid, &connector.dest_iofog_uuid),
            BridgeSide::Dest => (&connector.dest_iofog_uuid, &connector.source_iofog_uuid),
        };
        let config = serde_json::json!({
            "mode": side.mode(),
            "host": self.settings.connector_host,
            "port": connector.port,
            "localFog": local_fog,
            "remoteFog": remote_fog,
        });
        let now = epoch_secs();
        let bridge = Microservice {
            uuid: Uuid::new_v4().to_string(),
            name: format!("network-{}-{}", side.mode(), connector.port),
            user_id: None,
            catalog_item_id: self.settings.bridge_catalog_item_id,
            flow_id: None,
            iofog_uuid: Some(local_fog.clone()),
            config: config.to_string(),
            root_host_access: false,
            log_limit: BRIDGE_LOG_LIMIT_MB,
            is_network: true,
            created_at: now,
            updated_at: now,
        };
        txn.put_microservice(&bridge)?;
        info!(uuid = %bridge.uuid, fog = %local_fog, mode = side.mode(), "network microservice created");
        Ok(bridge.uuid)
    }

    /// Drop what `routing` held once nothing else uses it: the connector
    /// port when no routing references it anymore, and any network
    /// microservice no routing or connector port references.
    fn release(&self, txn: &StateTxn, routing: &Routing) -> ControlResult<()> {
        let mut candidates: Vec<String> = [
            routing.source_network_microservice_uuid.clone(),
            routing.dest_network_microservice_uuid.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();

        if let Some(id) = routing.connector_port_id {
            let remaining = txn.routings_via_connector_port(id)?.len();
            if remaining > 0 {
                debug!(connector_port_id = id, remaining, "bridge pair still shared");
            } else if let Some(connector) = txn.connector_port(id)? {
                candidates.extend(connector.source_network_microservice_uuid.clone());
                candidates.extend(connector.dest_network_microservice_uuid.clone());
                txn.delete_connector_port(id)?;
                info!(port = connector.port, "connector port released");
            }
        }

        candidates.sort();
        candidates.dedup();
        if candidates.is_empty() {
            return Ok(());
        }

        let routings = txn.routings()?;
        let connectors = txn.connector_ports()?;
        for bridge in candidates {
            let referenced = routings.iter().any(|r| {
                r.source_network_microservice_uuid.as_deref() == Some(bridge.as_str())
                    || r.dest_network_microservice_uuid.as_deref() == Some(bridge.as_str())
            }) || connectors.iter().any(|c| {
                c.source_network_microservice_uuid.as_deref() == Some(bridge.as_str())
                    || c.dest_network_microservice_uuid.as_deref() == Some(bridge.as_str())
            });
            if referenced {
                continue;
            }
            if txn.microservice(&bridge)?.is_some_and(|m| m.is_network) {
                txn.delete_microservice(&bridge)?;
                info!(uuid = %bridge, "network microservice deleted");
            }
        }
        Ok(())
    }
}

fn direct(source_uuid: &str, dest_uuid: &str) -> Routing {
    Routing {
        id: 0,
        is_network_connection: false,
        source_microservice_uuid: source_uuid.to_string(),
        dest_microservice_uuid: dest_uuid.to_string(),
        source_network_microservice_uuid: None,
        dest_network_microservice_uuid: None,
        source_iofog_uuid: None,
        dest_iofog_uuid: None,
        connector_port_id: None,
    }
}

/// `routing` with every bridge, fog and connector field cleared.
fn direct_like(routing: &Routing) -> Routing {
    Routing {
        id: routing.id,
        ..direct(&routing.source_microservice_uuid, &routing.dest_microservice_uuid)
    }
}
