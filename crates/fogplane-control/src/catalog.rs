//! Catalog resolver: catalog items a user may see.
//!
//! An item is visible to a user when the user owns it or it has no owner.
//! Results are [`CatalogItemDetails`], which never carry the owner id.

use serde::{Deserialize, Serialize};
use tracing::info;

use fogplane_core::{CatalogItemId, UserId};
use fogplane_state::{
    CatalogItem, CatalogItemDetails, CatalogItemImage, CatalogItemIoType, ImageInfo, IoTypeInfo,
    StateRead, StateStore, StateTxn,
};

use crate::error::{ControlError, ControlResult};

/// A catalog item to register.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCatalogItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub disk_required: u64,
    #[serde(default)]
    pub ram_required: u64,
    #[serde(default)]
    pub images: Vec<ImageInfo>,
    pub input_type: Option<IoTypeInfo>,
    pub output_type: Option<IoTypeInfo>,
}

/// Look up a catalog item through `reader`, applying the visibility rule.
pub fn visible_item(
    reader: &impl StateRead,
    id: CatalogItemId,
    user_id: UserId,
) -> ControlResult<CatalogItem> {
    reader
        .catalog_item(id)?
        .filter(|item| item.is_visible_to(user_id))
        .ok_or_else(|| ControlError::NotFound(format!("invalid catalog item id {id}")))
}

/// Read access to the catalog, scoped by user.
#[derive(Clone)]
pub struct CatalogResolver {
    store: StateStore,
}

impl CatalogResolver {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Items owned by `user_id` plus public items.
    pub fn list_visible(&self, user_id: UserId) -> ControlResult<Vec<CatalogItemDetails>> {
        let snap = self.store.snapshot()?;
        let mut items = Vec::new();
        for item in snap.catalog_items()? {
            if item.is_visible_to(user_id) {
                items.push(snap.catalog_item_details(item)?);
            }
        }
        Ok(items)
    }

    /// One item, `NotFound` unless owned by `user_id` or public.
    pub fn get_visible(
        &self,
        id: CatalogItemId,
        user_id: UserId,
    ) -> ControlResult<CatalogItemDetails> {
        let snap = self.store.snapshot()?;
        let item = visible_item(&snap, id, user_id)?;
        Ok(snap.catalog_item_details(item)?)
    }

    /// Register a catalog item with its images and io types.
    ///
    /// `owner = None` publishes the item to every user.
    pub fn add(
        &self,
        item: NewCatalogItem,
        owner: Option<UserId>,
    ) -> ControlResult<CatalogItemDetails> {
        if item.name.trim().is_empty() {
            return Err(ControlError::Validation("catalog item name is required".to_string()));
        }
        let details = self
            .store
            .transaction(|txn| add_item(txn, item, owner))?;
        info!(id = details.id, name = %details.name, "catalog item registered");
        Ok(details)
    }
}

fn add_item(
    txn: &StateTxn,
    item: NewCatalogItem,
    owner: Option<UserId>,
) -> ControlResult<CatalogItemDetails> {
    let id = txn.next_id(fogplane_state::tables::CATALOG_ITEM_SEQ)?;
    let row = CatalogItem {
        id,
        name: item.name,
        description: item.description,
        category: item.category,
        publisher: item.publisher,
        disk_required: item.disk_required,
        ram_required: item.ram_required,
        user_id: owner,
    };
    txn.put_catalog_item(&row)?;
    for image in item.images {
        txn.put_catalog_item_image(&CatalogItemImage {
            catalog_item_id: id,
            fog_type_id: image.fog_type_id,
            container_image: image.container_image,
        })?;
    }
    if let Some(io) = item.input_type {
        txn.put_catalog_item_input_type(&CatalogItemIoType {
            catalog_item_id: id,
            info_type: io.info_type,
            info_format: io.info_format,
        })?;
    }
    if let Some(io) = item.output_type {
        txn.put_catalog_item_output_type(&CatalogItemIoType {
            catalog_item_id: id,
            info_type: io.info_type,
            info_format: io.info_format,
        })?;
    }
    Ok(txn.catalog_item_details(row)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> NewCatalogItem {
        NewCatalogItem {
            name: name.to_string(),
            images: vec![ImageInfo {
                container_image: format!("acme/{name}"),
                fog_type_id: 1,
            }],
            input_type: Some(IoTypeInfo {
                info_type: "reading".to_string(),
                info_format: "json".to_string(),
            }),
            ..Default::default()
        }
    }

    fn resolver() -> CatalogResolver {
        CatalogResolver::new(StateStore::open_in_memory().unwrap())
    }

    #[test]
    fn list_visible_includes_owned_and_public_only() {
        let catalog = resolver();
        let public = catalog.add(item("public"), None).unwrap();
        let mine = catalog.add(item("mine"), Some(1)).unwrap();
        let theirs = catalog.add(item("theirs"), Some(2)).unwrap();

        let ids: Vec<u64> = catalog
            .list_visible(1)
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        assert!(ids.contains(&public.id));
        assert!(ids.contains(&mine.id));
        assert!(!ids.contains(&theirs.id));

        let ids: Vec<u64> = catalog
            .list_visible(2)
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&theirs.id));
    }

    #[test]
    fn get_visible_hides_other_users_items() {
        let catalog = resolver();
        let theirs = catalog.add(item("theirs"), Some(2)).unwrap();

        assert!(matches!(
            catalog.get_visible(theirs.id, 1),
            Err(ControlError::NotFound(_))
        ));
        assert_eq!(catalog.get_visible(theirs.id, 2).unwrap().name, "theirs");
    }

    #[test]
    fn get_visible_unknown_id_is_not_found() {
        let catalog = resolver();
        assert!(matches!(
            catalog.get_visible(42, 1),
            Err(ControlError::NotFound(_))
        ));
    }

    #[test]
    fn details_carry_nested_rows_without_owner() {
        let catalog = resolver();
        let added = catalog.add(item("sensor"), Some(1)).unwrap();
        let details = catalog.get_visible(added.id, 1).unwrap();
        assert_eq!(details.images[0].container_image, "acme/sensor");
        assert_eq!(details.input_type.as_ref().unwrap().info_format, "json");
        assert!(details.output_type.is_none());

        let json = serde_json::to_value(&details).unwrap();
        assert!(json.get("userId").is_none());
    }

    #[test]
    fn add_rejects_blank_name() {
        let catalog = resolver();
        assert!(matches!(
            catalog.add(item("  "), None),
            Err(ControlError::Validation(_))
        ));
    }
}
