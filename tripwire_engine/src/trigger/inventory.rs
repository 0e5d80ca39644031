//! Inventory triggers: scripted grid menus.
//!
//! An inventory trigger is a fixed grid of item slots plus a click script.
//! Grids come in rows of nine, at most six rows. Every open view is tracked
//! as an instance keyed by a fresh UUID; closing the view must release the
//! instance or the table leaks, so the close path is the only way out of the
//! map.

use crate::context::{ActivationContext, TriggerKind};
use crate::runtime::Runtime;
use crate::trigger::{ActivationOutcome, Trigger, TriggerStoreError};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

pub const SLOTS_PER_ROW: usize = 9;
pub const MAX_SLOTS: usize = 54;

/// Rejections from the inventory store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("inventory size {0} is not a positive multiple of {SLOTS_PER_ROW} at most {MAX_SLOTS}")]
    InvalidSize(usize),
    #[error("slot {slot} is out of range for a {size}-slot inventory")]
    SlotOutOfRange { slot: usize, size: usize },
    #[error("no open inventory instance {0}")]
    UnknownInstance(Uuid),
    #[error(transparent)]
    Store(#[from] TriggerStoreError),
}

/// An item displayed in a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemBinding {
    pub item_id: String,
    pub display_name: Option<String>,
    pub amount: u32,
}

impl ItemBinding {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            display_name: None,
            amount: 1,
        }
    }
}

struct InventoryTrigger {
    trigger: Trigger,
    slots: Vec<Option<ItemBinding>>,
}

/// Name-keyed store of inventory triggers plus the table of open views.
pub struct InventoryTriggerManager {
    rt: Arc<Runtime>,
    inventories: Mutex<HashMap<String, InventoryTrigger>>,
    instances: Mutex<HashMap<Uuid, String>>,
}

impl InventoryTriggerManager {
    pub fn new(rt: Arc<Runtime>) -> Self {
        Self {
            rt,
            inventories: Mutex::new(HashMap::new()),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// # Errors
    /// [`InventoryError::InvalidSize`] unless `size` is a positive multiple
    /// of nine no larger than 54; [`TriggerStoreError::Conflict`] and
    /// [`TriggerStoreError::Compile`] as for the other stores.
    pub fn create(&self, name: &str, size: usize, source: &str) -> Result<(), InventoryError> {
        if size == 0 || size % SLOTS_PER_ROW != 0 || size > MAX_SLOTS {
            return Err(InventoryError::InvalidSize(size));
        }
        let mut inventories = self.lock_inventories();
        if inventories.contains_key(name) {
            return Err(TriggerStoreError::Conflict(name.to_string()).into());
        }
        let trigger = Trigger::compile(name, TriggerKind::Inventory, source)
            .map_err(TriggerStoreError::from)?;
        inventories.insert(
            name.to_string(),
            InventoryTrigger {
                trigger,
                slots: vec![None; size],
            },
        );
        info!("created inventory trigger '{name}' with {size} slots");
        Ok(())
    }

    /// Remove an inventory and drop any instances still pointing at it.
    ///
    /// # Errors
    /// [`TriggerStoreError::NotFound`] when the name is not registered.
    pub fn delete(&self, name: &str) -> Result<(), TriggerStoreError> {
        self.lock_inventories()
            .remove(name)
            .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))?;
        self.lock_instances().retain(|_, inv| inv != name);
        info!("deleted inventory trigger '{name}'");
        Ok(())
    }

    /// # Errors
    /// [`TriggerStoreError::NotFound`] for an unknown inventory,
    /// [`InventoryError::SlotOutOfRange`] for a slot past the grid.
    pub fn set_item(&self, name: &str, slot: usize, item: Option<ItemBinding>) -> Result<(), InventoryError> {
        let mut inventories = self.lock_inventories();
        let inventory = inventories
            .get_mut(name)
            .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))?;
        let size = inventory.slots.len();
        if slot >= size {
            return Err(InventoryError::SlotOutOfRange { slot, size });
        }
        inventory.slots[slot] = item;
        Ok(())
    }

    /// # Errors
    /// Same lookup errors as [`Self::set_item`].
    pub fn item_at(&self, name: &str, slot: usize) -> Result<Option<ItemBinding>, InventoryError> {
        let inventories = self.lock_inventories();
        let inventory = inventories
            .get(name)
            .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))?;
        let size = inventory.slots.len();
        if slot >= size {
            return Err(InventoryError::SlotOutOfRange { slot, size });
        }
        Ok(inventory.slots[slot].clone())
    }

    /// Register a newly opened view and get its instance handle.
    ///
    /// # Errors
    /// [`TriggerStoreError::NotFound`] for an unknown inventory.
    pub fn open_instance(&self, name: &str) -> Result<Uuid, InventoryError> {
        if !self.lock_inventories().contains_key(name) {
            return Err(TriggerStoreError::NotFound(name.to_string()).into());
        }
        let id = Uuid::new_v4();
        self.lock_instances().insert(id, name.to_string());
        debug!("opened instance {id} of inventory '{name}'");
        Ok(id)
    }

    /// Release a closed view; `false` when the handle was already gone.
    pub fn instance_closed(&self, id: Uuid) -> bool {
        let removed = self.lock_instances().remove(&id).is_some();
        if removed {
            debug!("closed inventory instance {id}");
        }
        removed
    }

    pub fn trigger_for_instance(&self, id: Uuid) -> Option<String> {
        self.lock_instances().get(&id).cloned()
    }

    pub fn open_count(&self) -> usize {
        self.lock_instances().len()
    }

    /// Run the click script for a slot click in an open view.
    ///
    /// # Errors
    /// [`InventoryError::UnknownInstance`] for a stale handle,
    /// [`InventoryError::SlotOutOfRange`] for a slot past the grid.
    pub fn run_click(
        &self,
        id: Uuid,
        slot: usize,
        ctx: Arc<dyn ActivationContext>,
    ) -> Result<Option<ActivationOutcome>, InventoryError> {
        let name = self
            .trigger_for_instance(id)
            .ok_or(InventoryError::UnknownInstance(id))?;
        let trigger = {
            let inventories = self.lock_inventories();
            let inventory = inventories
                .get(&name)
                .ok_or_else(|| TriggerStoreError::NotFound(name.clone()))?;
            let size = inventory.slots.len();
            if slot >= size {
                return Err(InventoryError::SlotOutOfRange { slot, size });
            }
            inventory.trigger.clone()
        };
        Ok(trigger.activate(ctx, &self.rt))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock_inventories().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock_inventories(&self) -> std::sync::MutexGuard<'_, HashMap<String, InventoryTrigger>> {
        self.inventories.lock().expect("inventory table lock poisoned")
    }

    fn lock_instances(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, String>> {
        self.instances.lock().expect("instance table lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SystemContext;
    use crate::registry::{Executor, Registry};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn runtime() -> Arc<Runtime> {
        Runtime::builder().build()
    }

    #[test]
    fn size_must_be_a_row_multiple_up_to_fifty_four() {
        let mgr = InventoryTriggerManager::new(runtime());
        for bad in [0, 5, 10, 63] {
            assert_eq!(
                mgr.create("menu", bad, "x = 1").unwrap_err(),
                InventoryError::InvalidSize(bad)
            );
        }
        for good in [9, 27, 54] {
            mgr.create(&format!("menu{good}"), good, "x = 1").unwrap();
        }
    }

    #[test]
    fn items_live_in_bounds_checked_slots() {
        let mgr = InventoryTriggerManager::new(runtime());
        mgr.create("menu", 9, "x = 1").unwrap();
        mgr.set_item("menu", 4, Some(ItemBinding::new("compass"))).unwrap();
        assert_eq!(mgr.item_at("menu", 4).unwrap().unwrap().item_id, "compass");
        assert_eq!(mgr.item_at("menu", 0).unwrap(), None);
        assert_eq!(
            mgr.set_item("menu", 9, Some(ItemBinding::new("compass"))).unwrap_err(),
            InventoryError::SlotOutOfRange { slot: 9, size: 9 }
        );
    }

    #[test]
    fn instance_lifecycle_is_leak_free() {
        let mgr = InventoryTriggerManager::new(runtime());
        mgr.create("menu", 9, "x = 1").unwrap();

        let a = mgr.open_instance("menu").unwrap();
        let b = mgr.open_instance("menu").unwrap();
        assert_ne!(a, b);
        assert_eq!(mgr.open_count(), 2);
        assert_eq!(mgr.trigger_for_instance(a).as_deref(), Some("menu"));

        assert!(mgr.instance_closed(a));
        assert!(!mgr.instance_closed(a));
        assert_eq!(mgr.open_count(), 1);
        assert!(mgr.instance_closed(b));
        assert_eq!(mgr.open_count(), 0);
    }

    #[test]
    fn deleting_an_inventory_drops_its_instances() {
        let mgr = InventoryTriggerManager::new(runtime());
        mgr.create("menu", 9, "x = 1").unwrap();
        let id = mgr.open_instance("menu").unwrap();
        mgr.delete("menu").unwrap();
        assert_eq!(mgr.trigger_for_instance(id), None);
        assert_eq!(mgr.open_count(), 0);
    }

    #[test]
    fn clicks_run_the_script_with_bounds_checks() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        let counter = count.clone();
        registry.register_executor(Executor::new("CLICKED", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        let rt = Runtime::builder().registry(registry).build();
        let mgr = InventoryTriggerManager::new(rt);
        mgr.create("menu", 9, "SYNC\n#CLICKED()").unwrap();
        let id = mgr.open_instance("menu").unwrap();

        let ctx: Arc<dyn ActivationContext> = Arc::new(SystemContext::new(TriggerKind::Inventory));
        let outcome = mgr.run_click(id, 3, ctx.clone()).unwrap();
        assert_eq!(outcome, Some(ActivationOutcome::Completed));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert_eq!(
            mgr.run_click(id, 9, ctx.clone()).unwrap_err(),
            InventoryError::SlotOutOfRange { slot: 9, size: 9 }
        );
        mgr.instance_closed(id);
        assert_eq!(
            mgr.run_click(id, 3, ctx).unwrap_err(),
            InventoryError::UnknownInstance(id)
        );
    }
}
