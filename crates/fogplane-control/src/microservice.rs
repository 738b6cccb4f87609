//! Microservice lifecycle: create, update, delete and read.
//!
//! Every entry point receives the already-authenticated user id. A
//! microservice the user does not own is reported as `NotFound`, as are
//! network microservices, which only the route topology manages.
//!
//! Input validation (name, log limit, root-access flags, mapping grammar)
//! happens before the unit of work starts; checks that need stored state
//! run inside it, so a failure leaves nothing behind.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use fogplane_core::{CatalogItemId, FogUuid, UserId};
use fogplane_state::{
    Fog, Microservice, MicroserviceDetails, Routing, StateRead, StateStore, StateTxn,
};

use crate::catalog::visible_item;
use crate::epoch_secs;
use crate::error::{ControlError, ControlResult};
use crate::mapping::{PortSpec, VolumeSpec, parse_entries, parse_port, parse_volume};
use crate::routing::RouteTopology;
use crate::settings::ControlSettings;

fn default_log_limit() -> u32 {
    50
}

/// Intent for a new microservice, as supplied by the CLI or API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMicroservice {
    pub name: String,
    pub catalog_item_id: CatalogItemId,
    #[serde(default)]
    pub flow_id: Option<u64>,
    #[serde(default, alias = "ioFogNodeId")]
    pub iofog_uuid: Option<FogUuid>,
    #[serde(default)]
    pub config: String,
    /// `hostPath:containerPath[:rw|ro]` entries.
    #[serde(default)]
    pub volume_mappings: Vec<String>,
    #[serde(default = "default_log_limit")]
    pub log_limit: u32,
    #[serde(default)]
    pub root_enable: bool,
    #[serde(default)]
    pub root_disable: bool,
    /// `internal:external[:tunnel]` entries.
    #[serde(default)]
    pub ports: Vec<String>,
    /// Destination microservice UUIDs.
    #[serde(default)]
    pub routes: Vec<String>,
}

impl Default for NewMicroservice {
    fn default() -> Self {
        Self {
            name: String::new(),
            catalog_item_id: 0,
            flow_id: None,
            iofog_uuid: None,
            config: String::new(),
            volume_mappings: Vec::new(),
            log_limit: default_log_limit(),
            root_enable: false,
            root_disable: false,
            ports: Vec::new(),
            routes: Vec::new(),
        }
    }
}

/// Partial update. `None` leaves the stored value untouched; `Some` is
/// applied even when empty or zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroserviceUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub config: Option<String>,
    #[serde(default)]
    pub catalog_item_id: Option<CatalogItemId>,
    #[serde(default)]
    pub flow_id: Option<u64>,
    #[serde(default, alias = "ioFogNodeId")]
    pub iofog_uuid: Option<FogUuid>,
    /// Replaces every volume mapping when present.
    #[serde(default)]
    pub volume_mappings: Option<Vec<String>>,
    /// Replaces every port mapping when present.
    #[serde(default)]
    pub ports: Option<Vec<String>>,
    #[serde(default)]
    pub log_limit: Option<u32>,
    #[serde(default)]
    pub root_enable: bool,
    #[serde(default)]
    pub root_disable: bool,
}

/// Resolve the mutually exclusive root-access flags.
///
/// `Ok(None)` means neither flag was given: callers default to `false` on
/// create and keep the stored value on update.
pub fn resolve_root_access(enable: bool, disable: bool) -> ControlResult<Option<bool>> {
    match (enable, disable) {
        (true, true) => Err(ControlError::Validation(
            "root access cannot be both enabled and disabled".to_string(),
        )),
        (true, false) => Ok(Some(true)),
        (false, true) => Ok(Some(false)),
        (false, false) => Ok(None),
    }
}

/// Creates, updates and deletes microservices and their routes.
#[derive(Clone)]
pub struct MicroserviceManager {
    store: StateStore,
    settings: ControlSettings,
    routes: RouteTopology,
}

impl MicroserviceManager {
    pub fn new(store: StateStore, settings: ControlSettings) -> Self {
        let routes = RouteTopology::new(store.clone(), settings.clone());
        Self {
            store,
            settings,
            routes,
        }
    }

    pub fn topology(&self) -> &RouteTopology {
        &self.routes
    }

    /// Create a microservice with its ports, volumes and initial routes.
    pub fn create(
        &self,
        user_id: UserId,
        request: NewMicroservice,
    ) -> ControlResult<MicroserviceDetails> {
        validate_name(&request.name)?;
        self.validate_log_limit(request.log_limit)?;
        let root_host_access = resolve_root_access(request.root_enable, request.root_disable)?
            .unwrap_or(false);
        let ports = parse_entries(&request.ports, "port", parse_port);
        let volumes = parse_entries(&request.volume_mappings, "volume", parse_volume);
        check_unique_externals(&ports)?;

        let details = self.store.transaction(|txn| {
            visible_item(txn, request.catalog_item_id, user_id)?;
            if let Some(fog_uuid) = &request.iofog_uuid {
                let fog = placement_fog(txn, fog_uuid, user_id)?;
                check_image(txn, request.catalog_item_id, &fog)?;
            }

            let now = epoch_secs();
            let microservice = Microservice {
                uuid: Uuid::new_v4().to_string(),
                name: request.name.clone(),
                user_id: Some(user_id),
                catalog_item_id: request.catalog_item_id,
                flow_id: request.flow_id,
                iofog_uuid: request.iofog_uuid.clone(),
                config: request.config.clone(),
                root_host_access,
                log_limit: request.log_limit,
                is_network: false,
                created_at: now,
                updated_at: now,
            };
            check_port_conflicts(txn, &microservice, &ports)?;
            txn.put_microservice(&microservice)?;
            write_ports(txn, &microservice.uuid, &ports)?;
            write_volumes(txn, &microservice.uuid, &volumes)?;

            for dest in &request.routes {
                owned_microservice(txn, dest, user_id)?;
                self.routes.add_route_in(txn, &microservice.uuid, dest)?;
            }
            Ok::<_, ControlError>(txn.microservice_details(microservice)?)
        })?;

        info!(
            uuid = %details.microservice.uuid,
            name = %details.microservice.name,
            ports = details.ports.len(),
            volumes = details.volume_mappings.len(),
            routes = details.routes.len(),
            "microservice created"
        );
        Ok(details)
    }

    /// Apply a partial update. Moving to another fog re-provisions every
    /// route touching the microservice.
    pub fn update(
        &self,
        user_id: UserId,
        uuid: &str,
        update: MicroserviceUpdate,
    ) -> ControlResult<MicroserviceDetails> {
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if let Some(log_limit) = update.log_limit {
            self.validate_log_limit(log_limit)?;
        }
        let root_host_access = resolve_root_access(update.root_enable, update.root_disable)?;
        let ports = update
            .ports
            .as_deref()
            .map(|entries| parse_entries(entries, "port", parse_port));
        let volumes = update
            .volume_mappings
            .as_deref()
            .map(|entries| parse_entries(entries, "volume", parse_volume));
        if let Some(ports) = &ports {
            check_unique_externals(ports)?;
        }

        let details = self.store.transaction(|txn| {
            let mut microservice = owned_microservice(txn, uuid, user_id)?;
            let previous_fog = microservice.iofog_uuid.clone();

            if let Some(name) = &update.name {
                microservice.name = name.clone();
            }
            if let Some(config) = &update.config {
                microservice.config = config.clone();
            }
            if let Some(catalog_item_id) = update.catalog_item_id {
                visible_item(txn, catalog_item_id, user_id)?;
                microservice.catalog_item_id = catalog_item_id;
            }
            if let Some(flow_id) = update.flow_id {
                microservice.flow_id = Some(flow_id);
            }
            if let Some(log_limit) = update.log_limit {
                microservice.log_limit = log_limit;
            }
            if let Some(root) = root_host_access {
                microservice.root_host_access = root;
            }
            if let Some(fog_uuid) = &update.iofog_uuid {
                microservice.iofog_uuid = Some(fog_uuid.clone());
            }

            let moved = microservice.iofog_uuid != previous_fog;
            if moved || update.catalog_item_id.is_some() {
                if let Some(fog_uuid) = &microservice.iofog_uuid {
                    let fog = placement_fog(txn, fog_uuid, user_id)?;
                    check_image(txn, microservice.catalog_item_id, &fog)?;
                }
            }

            match &ports {
                Some(ports) => {
                    check_port_conflicts(txn, &microservice, ports)?;
                    txn.delete_ports_for(uuid)?;
                    write_ports(txn, uuid, ports)?;
                }
                None if moved => {
                    let kept: Vec<PortSpec> = txn
                        .ports_for(uuid)?
                        .into_iter()
                        .map(|p| PortSpec {
                            internal: p.internal,
                            external: p.external,
                            tunnel: p.tunnel,
                        })
                        .collect();
                    check_port_conflicts(txn, &microservice, &kept)?;
                }
                None => {}
            }
            if let Some(volumes) = &volumes {
                txn.delete_volumes_for(uuid)?;
                write_volumes(txn, uuid, volumes)?;
            }

            microservice.updated_at = epoch_secs();
            txn.put_microservice(&microservice)?;

            if moved {
                let changed = self.routes.reconcile_microservice_in(txn, uuid)?;
                debug!(%uuid, changed, "routes reconciled after move");
            }
            Ok::<_, ControlError>(txn.microservice_details(microservice)?)
        })?;

        info!(%uuid, "microservice updated");
        Ok(details)
    }

    /// Delete a microservice, removing its routes first so shared bridges
    /// are released only when their last route goes.
    pub fn delete(&self, user_id: UserId, uuid: &str) -> ControlResult<()> {
        self.store.transaction(|txn| {
            owned_microservice(txn, uuid, user_id)?;
            for routing in txn.routings_touching(uuid)? {
                self.routes.remove_route_in(
                    txn,
                    &routing.source_microservice_uuid,
                    &routing.dest_microservice_uuid,
                )?;
            }
            txn.delete_microservice(uuid)?;
            Ok::<_, ControlError>(())
        })?;
        info!(%uuid, "microservice deleted");
        Ok(())
    }

    pub fn get(&self, user_id: UserId, uuid: &str) -> ControlResult<MicroserviceDetails> {
        let snap = self.store.snapshot()?;
        let microservice = owned_microservice(&snap, uuid, user_id)?;
        Ok(snap.microservice_details(microservice)?)
    }

    pub fn list(&self, user_id: UserId) -> ControlResult<Vec<MicroserviceDetails>> {
        let snap = self.store.snapshot()?;
        snap.microservices_for_user(user_id)?
            .into_iter()
            .map(|m| snap.microservice_details(m).map_err(ControlError::from))
            .collect()
    }

    /// Everything a fog runs, network microservices included. Used by the
    /// agent-facing endpoint.
    pub fn list_on_fog(&self, fog_uuid: &str) -> ControlResult<Vec<MicroserviceDetails>> {
        let snap = self.store.snapshot()?;
        snap.microservices_on_fog(fog_uuid)?
            .into_iter()
            .map(|m| snap.microservice_details(m).map_err(ControlError::from))
            .collect()
    }

    /// Resolve the fog an agent token belongs to.
    pub fn fog_for_token(&self, token: &str) -> ControlResult<Fog> {
        self.store
            .snapshot()?
            .fog_by_token(token)?
            .ok_or_else(|| ControlError::NotFound("unknown fog access token".to_string()))
    }

    pub fn add_route(&self, user_id: UserId, source: &str, dest: &str) -> ControlResult<Routing> {
        self.store.transaction(|txn| {
            owned_microservice(txn, source, user_id)?;
            owned_microservice(txn, dest, user_id)?;
            self.routes.add_route_in(txn, source, dest)
        })
    }

    pub fn remove_route(
        &self,
        user_id: UserId,
        source: &str,
        dest: &str,
    ) -> ControlResult<Routing> {
        self.store.transaction(|txn| {
            owned_microservice(txn, source, user_id)?;
            owned_microservice(txn, dest, user_id)?;
            self.routes.remove_route_in(txn, source, dest)
        })
    }

    pub fn routes_for(&self, user_id: UserId, uuid: &str) -> ControlResult<Vec<Routing>> {
        let snap = self.store.snapshot()?;
        owned_microservice(&snap, uuid, user_id)?;
        Ok(snap.routings_from(uuid)?)
    }

    fn validate_log_limit(&self, log_limit: u32) -> ControlResult<()> {
        if log_limit > self.settings.max_log_limit_mb {
            return Err(ControlError::Validation(format!(
                "logLimit {log_limit} exceeds the maximum of {} MB",
                self.settings.max_log_limit_mb
            )));
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> ControlResult<()> {
    if name.trim().is_empty() {
        return Err(ControlError::Validation(
            "microservice name is required".to_string(),
        ));
    }
    Ok(())
}

/// A user microservice owned by `user_id`.
fn owned_microservice(
    reader: &impl StateRead,
    uuid: &str,
    user_id: UserId,
) -> ControlResult<Microservice> {
    reader
        .microservice(uuid)?
        .filter(|m| !m.is_network && m.user_id == Some(user_id))
        .ok_or_else(|| ControlError::NotFound(format!("invalid microservice uuid {uuid}")))
}

/// A fog `user_id` may place microservices on: unowned or their own.
fn placement_fog(txn: &StateTxn, fog_uuid: &str, user_id: UserId) -> ControlResult<Fog> {
    txn.fog(fog_uuid)?
        .filter(|fog| fog.user_id.is_none_or(|owner| owner == user_id))
        .ok_or_else(|| ControlError::NotFound(format!("invalid fog uuid {fog_uuid}")))
}

/// Items listing images must have one for the fog's node type.
fn check_image(txn: &StateTxn, catalog_item_id: CatalogItemId, fog: &Fog) -> ControlResult<()> {
    let images = txn.catalog_item_images(catalog_item_id)?;
    if images.is_empty() || images.iter().any(|i| i.fog_type_id == fog.fog_type_id) {
        return Ok(());
    }
    Err(ControlError::Validation(format!(
        "catalog item {catalog_item_id} has no image for fog type {} of fog {}",
        fog.fog_type_id, fog.uuid
    )))
}

fn check_unique_externals(ports: &[PortSpec]) -> ControlResult<()> {
    let mut seen = HashSet::new();
    for port in ports {
        if !seen.insert(port.external) {
            return Err(ControlError::Validation(format!(
                "external port {} is mapped twice",
                port.external
            )));
        }
    }
    Ok(())
}

/// External ports must be free among the other microservices on the fog.
fn check_port_conflicts(
    txn: &StateTxn,
    microservice: &Microservice,
    ports: &[PortSpec],
) -> ControlResult<()> {
    let Some(fog_uuid) = &microservice.iofog_uuid else {
        return Ok(());
    };
    if ports.is_empty() {
        return Ok(());
    }
    let mut taken = HashSet::new();
    for other in txn.microservices_on_fog(fog_uuid)? {
        if other.uuid == microservice.uuid {
            continue;
        }
        taken.extend(txn.ports_for(&other.uuid)?.into_iter().map(|p| p.external));
    }
    match ports.iter().find(|p| taken.contains(&p.external)) {
        Some(port) => Err(ControlError::Validation(format!(
            "external port {} is already used on fog {fog_uuid}",
            port.external
        ))),
        None => Ok(()),
    }
}

fn write_ports(txn: &StateTxn, uuid: &str, ports: &[PortSpec]) -> ControlResult<()> {
    for port in ports {
        txn.insert_port(uuid, port.internal, port.external, port.tunnel)?;
    }
    Ok(())
}

fn write_volumes(txn: &StateTxn, uuid: &str, volumes: &[VolumeSpec]) -> ControlResult<()> {
    for volume in volumes {
        txn.insert_volume(
            uuid,
            &volume.host_destination,
            &volume.container_destination,
            &volume.access_mode,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fogplane_state::{CatalogItem, CatalogItemImage, StateResult};

    const ALICE: UserId = 1;
    const BOB: UserId = 2;

    fn fog(uuid: &str, owner: Option<UserId>, fog_type_id: u32) -> Fog {
        Fog {
            uuid: uuid.to_string(),
            name: uuid.to_string(),
            user_id: owner,
            fog_type_id,
            created_at: 0,
        }
    }

    fn catalog_item(id: u64, owner: Option<UserId>) -> CatalogItem {
        CatalogItem {
            id,
            name: format!("item-{id}"),
            description: String::new(),
            category: String::new(),
            publisher: String::new(),
            disk_required: 0,
            ram_required: 0,
            user_id: owner,
        }
    }

    /// Fogs n1, n2 (type 1, shared), bob-node (type 1, Bob's), arm (type 2).
    /// Item 7 is public with a type-1 image, item 8 is Bob's.
    fn manager() -> (StateStore, MicroserviceManager) {
        let store = StateStore::open_in_memory().unwrap();
        store
            .transaction(|txn| -> StateResult<()> {
                txn.put_fog(&fog("n1", None, 1))?;
                txn.put_fog(&fog("n2", None, 1))?;
                txn.put_fog(&fog("bob-node", Some(BOB), 1))?;
                txn.put_fog(&fog("arm", None, 2))?;
                txn.put_catalog_item(&catalog_item(7, None))?;
                txn.put_catalog_item_image(&CatalogItemImage {
                    catalog_item_id: 7,
                    fog_type_id: 1,
                    container_image: "acme/sensor".to_string(),
                })?;
                txn.put_catalog_item(&catalog_item(8, Some(BOB)))?;
                Ok(())
            })
            .unwrap();
        let manager = MicroserviceManager::new(store.clone(), ControlSettings::default());
        (store, manager)
    }

    fn request(name: &str, fog: &str) -> NewMicroservice {
        NewMicroservice {
            name: name.to_string(),
            catalog_item_id: 7,
            iofog_uuid: Some(fog.to_string()),
            log_limit: 50,
            ..Default::default()
        }
    }

    fn microservice_count(store: &StateStore) -> usize {
        store.snapshot().unwrap().microservices().unwrap().len()
    }

    #[test]
    fn root_access_resolution() {
        assert!(matches!(
            resolve_root_access(true, true),
            Err(ControlError::Validation(_))
        ));
        assert_eq!(resolve_root_access(true, false).unwrap(), Some(true));
        assert_eq!(resolve_root_access(false, true).unwrap(), Some(false));
        assert_eq!(resolve_root_access(false, false).unwrap(), None);
    }

    #[test]
    fn create_persists_mappings_and_skips_malformed_entries() {
        let (_store, manager) = manager();
        let details = manager
            .create(
                ALICE,
                NewMicroservice {
                    ports: vec!["80:8080:false".to_string(), "nonsense".to_string()],
                    volume_mappings: vec!["/var/data:/data:ro".to_string(), "bad".to_string()],
                    root_enable: true,
                    ..request("a", "n1")
                },
            )
            .unwrap();

        assert_eq!(details.microservice.user_id, Some(ALICE));
        assert!(details.microservice.root_host_access);
        assert_eq!(details.ports.len(), 1);
        assert_eq!(details.ports[0].external, 8080);
        assert_eq!(details.volume_mappings.len(), 1);
        assert_eq!(details.volume_mappings[0].access_mode, "ro");
        assert!(details.routes.is_empty());
        assert_eq!(manager.get(ALICE, &details.microservice.uuid).unwrap(), details);
    }

    #[test]
    fn default_request_matches_json_defaults() {
        let parsed: NewMicroservice =
            serde_json::from_str(r#"{"name":"a","catalogItemId":7}"#).unwrap();
        let built = NewMicroservice::default();
        assert_eq!(built.log_limit, parsed.log_limit);
        assert_eq!(built.log_limit, 50);
        assert_eq!(built.config, parsed.config);
        assert!(built.ports.is_empty() && built.routes.is_empty());
    }

    #[test]
    fn create_defaults_root_access_to_false() {
        let (_store, manager) = manager();
        let details = manager.create(ALICE, request("a", "n1")).unwrap();
        assert!(!details.microservice.root_host_access);
    }

    #[test]
    fn create_with_both_root_flags_writes_nothing() {
        let (store, manager) = manager();
        let err = manager
            .create(
                ALICE,
                NewMicroservice {
                    root_enable: true,
                    root_disable: true,
                    ..request("a", "n1")
                },
            )
            .unwrap_err();
        assert!(matches!(err, ControlError::Validation(_)));
        assert_eq!(microservice_count(&store), 0);
    }

    #[test]
    fn create_with_invisible_catalog_item_is_not_found() {
        let (store, manager) = manager();
        let err = manager
            .create(
                ALICE,
                NewMicroservice {
                    catalog_item_id: 8,
                    ..request("a", "n1")
                },
            )
            .unwrap_err();
        assert!(matches!(err, ControlError::NotFound(_)));
        assert_eq!(microservice_count(&store), 0);
    }

    #[test]
    fn create_on_missing_or_foreign_fog_is_not_found() {
        let (_store, manager) = manager();
        assert!(matches!(
            manager.create(ALICE, request("a", "ghost")),
            Err(ControlError::NotFound(_))
        ));
        assert!(matches!(
            manager.create(ALICE, request("a", "bob-node")),
            Err(ControlError::NotFound(_))
        ));
        assert!(manager.create(BOB, request("b", "bob-node")).is_ok());
    }

    #[test]
    fn create_rejects_incompatible_fog_type() {
        let (_store, manager) = manager();
        assert!(matches!(
            manager.create(ALICE, request("a", "arm")),
            Err(ControlError::Validation(_))
        ));
    }

    #[test]
    fn create_rejects_log_limit_over_maximum() {
        let (_store, manager) = manager();
        let err = manager
            .create(
                ALICE,
                NewMicroservice {
                    log_limit: 5000,
                    ..request("a", "n1")
                },
            )
            .unwrap_err();
        assert!(matches!(err, ControlError::Validation(_)));
    }

    #[test]
    fn external_port_conflicts_on_same_fog() {
        let (_store, manager) = manager();
        let with_port = |name: &str, fog: &str| NewMicroservice {
            ports: vec!["80:8080".to_string()],
            ..request(name, fog)
        };
        manager.create(ALICE, with_port("a", "n1")).unwrap();
        assert!(matches!(
            manager.create(ALICE, with_port("b", "n1")),
            Err(ControlError::Validation(_))
        ));
        assert!(manager.create(ALICE, with_port("c", "n2")).is_ok());
    }

    #[test]
    fn update_leaves_omitted_fields_and_applies_present_empty_ones() {
        let (_store, manager) = manager();
        let created = manager
            .create(
                ALICE,
                NewMicroservice {
                    config: "{\"rate\":5}".to_string(),
                    root_enable: true,
                    ports: vec!["80:8080".to_string()],
                    ..request("a", "n1")
                },
            )
            .unwrap();
        let uuid = created.microservice.uuid.clone();

        let untouched = manager
            .update(ALICE, &uuid, MicroserviceUpdate::default())
            .unwrap();
        assert_eq!(untouched.microservice.name, "a");
        assert_eq!(untouched.microservice.config, "{\"rate\":5}");
        assert!(untouched.microservice.root_host_access);
        assert_eq!(untouched.ports.len(), 1);

        let cleared = manager
            .update(
                ALICE,
                &uuid,
                MicroserviceUpdate {
                    config: Some(String::new()),
                    log_limit: Some(0),
                    ports: Some(Vec::new()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(cleared.microservice.config, "");
        assert_eq!(cleared.microservice.log_limit, 0);
        assert!(cleared.ports.is_empty());
        assert_eq!(cleared.microservice.name, "a");
        assert!(cleared.microservice.root_host_access);
    }

    #[test]
    fn update_payload_absence_comes_from_json() {
        let update: MicroserviceUpdate =
            serde_json::from_str(r#"{"config":"","rootDisable":true}"#).unwrap();
        assert_eq!(update.config.as_deref(), Some(""));
        assert!(update.name.is_none());
        assert!(update.log_limit.is_none());
        assert!(update.root_disable);
    }

    #[test]
    fn update_root_flags() {
        let (_store, manager) = manager();
        let uuid = manager
            .create(ALICE, request("a", "n1"))
            .unwrap()
            .microservice
            .uuid;

        let enabled = manager
            .update(
                ALICE,
                &uuid,
                MicroserviceUpdate {
                    root_enable: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(enabled.microservice.root_host_access);

        let err = manager
            .update(
                ALICE,
                &uuid,
                MicroserviceUpdate {
                    root_enable: true,
                    root_disable: true,
                    name: Some("renamed".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, ControlError::Validation(_)));
        assert_eq!(manager.get(ALICE, &uuid).unwrap().microservice.name, "a");
    }

    #[test]
    fn other_users_microservices_are_not_found() {
        let (_store, manager) = manager();
        let uuid = manager
            .create(ALICE, request("a", "n1"))
            .unwrap()
            .microservice
            .uuid;

        assert!(matches!(manager.get(BOB, &uuid), Err(ControlError::NotFound(_))));
        assert!(matches!(
            manager.update(BOB, &uuid, MicroserviceUpdate::default()),
            Err(ControlError::NotFound(_))
        ));
        assert!(matches!(manager.delete(BOB, &uuid), Err(ControlError::NotFound(_))));
        assert!(manager.list(BOB).unwrap().is_empty());
        assert_eq!(manager.list(ALICE).unwrap().len(), 1);
    }

    #[test]
    fn network_microservices_are_not_managed_here() {
        let (store, manager) = manager();
        let a = manager.create(ALICE, request("a", "n1")).unwrap().microservice.uuid;
        let b = manager.create(ALICE, request("b", "n2")).unwrap().microservice.uuid;
        let routing = manager.add_route(ALICE, &a, &b).unwrap();
        let bridge = routing.source_network_microservice_uuid.unwrap();

        assert!(matches!(manager.delete(ALICE, &bridge), Err(ControlError::NotFound(_))));
        assert!(store.snapshot().unwrap().microservice(&bridge).unwrap().is_some());
        assert_eq!(manager.list_on_fog("n1").unwrap().len(), 2);
    }

    #[test]
    fn create_with_routes_wires_them_atomically() {
        let (store, manager) = manager();
        let b = manager.create(ALICE, request("b", "n2")).unwrap().microservice.uuid;

        let a = manager
            .create(
                ALICE,
                NewMicroservice {
                    routes: vec![b.clone()],
                    ..request("a", "n1")
                },
            )
            .unwrap();
        assert_eq!(a.routes, vec![b.clone()]);

        let err = manager
            .create(
                ALICE,
                NewMicroservice {
                    routes: vec![b.clone(), "ghost".to_string()],
                    ..request("c", "n1")
                },
            )
            .unwrap_err();
        assert!(matches!(err, ControlError::NotFound(_)));
        // b, a and the two bridges of n1 -> n2.
        assert_eq!(microservice_count(&store), 4);
        assert_eq!(store.snapshot().unwrap().routings().unwrap().len(), 1);
    }

    #[test]
    fn delete_releases_routes_and_bridges() {
        let (store, manager) = manager();
        let a = manager.create(ALICE, request("a", "n1")).unwrap().microservice.uuid;
        let b = manager.create(ALICE, request("b", "n2")).unwrap().microservice.uuid;
        manager.add_route(ALICE, &a, &b).unwrap();

        manager.delete(ALICE, &b).unwrap();

        let snap = store.snapshot().unwrap();
        assert!(snap.routings().unwrap().is_empty());
        assert!(snap.connector_ports().unwrap().is_empty());
        assert_eq!(snap.microservices().unwrap().len(), 1);
    }

    #[test]
    fn moving_to_another_fog_rebuilds_routes() {
        let (_store, manager) = manager();
        let a = manager.create(ALICE, request("a", "n1")).unwrap().microservice.uuid;
        let b = manager.create(ALICE, request("b", "n1")).unwrap().microservice.uuid;
        assert!(!manager.add_route(ALICE, &a, &b).unwrap().is_network_connection);

        manager
            .update(
                ALICE,
                &b,
                MicroserviceUpdate {
                    iofog_uuid: Some("n2".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let routes = manager.routes_for(ALICE, &a).unwrap();
        assert_eq!(routes.len(), 1);
        assert!(routes[0].is_network_connection);
        assert_eq!(routes[0].dest_iofog_uuid.as_deref(), Some("n2"));
    }
}
