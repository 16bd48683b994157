// ── Entity catalogue ──
//
// The maps of everything the bridge has ever mentioned, keyed by id.
// Entities are created on first sight and then only updated in place,
// so subscriptions taken on them stay valid across reconnects. Only
// the dispatcher writes here; readers get snapshot copies.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::model::link::CommandLink;
use crate::model::{Component, Device, Room};

pub(crate) struct Catalogue {
    devices: DashMap<i64, Device>,
    components: DashMap<i64, Arc<Component>>,
    rooms: DashMap<i64, Arc<Room>>,
    link: CommandLink,
}

impl Catalogue {
    pub(crate) fn new(link: CommandLink) -> Self {
        Self {
            devices: DashMap::new(),
            components: DashMap::new(),
            rooms: DashMap::new(),
            link,
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub(crate) fn devices(&self) -> HashMap<i64, Device> {
        self.devices.iter().map(|e| (*e.key(), e.value().clone())).collect()
    }

    pub(crate) fn components(&self) -> HashMap<i64, Arc<Component>> {
        self.components.iter().map(|e| (*e.key(), Arc::clone(e.value()))).collect()
    }

    pub(crate) fn rooms(&self) -> HashMap<i64, Arc<Room>> {
        self.rooms.iter().map(|e| (*e.key(), Arc::clone(e.value()))).collect()
    }

    pub(crate) fn device(&self, id: i64) -> Option<Device> {
        self.devices.get(&id).map(|e| e.value().clone())
    }

    pub(crate) fn component(&self, id: i64) -> Option<Arc<Component>> {
        self.components.get(&id).map(|e| Arc::clone(e.value()))
    }

    pub(crate) fn room(&self, id: i64) -> Option<Arc<Room>> {
        self.rooms.get(&id).map(|e| Arc::clone(e.value()))
    }

    // ── Dispatch targets ─────────────────────────────────────────────

    /// Incremental state for one device. Unknown ids are swallowed: the
    /// bridge pushes state for devices it never put in the inventory.
    pub(crate) fn apply_device_state(&self, payload: &Value) {
        let Some(id) = payload["deviceId"].as_i64() else {
            debug!("device state without deviceId");
            return;
        };
        match self.devices.get(&id) {
            Some(device) => device.apply_state(payload),
            None => trace!(device_id = id, "state for unknown device, ignored"),
        }
    }

    /// One entry of a batched state frame, classified by whichever id
    /// field it carries.
    pub(crate) fn apply_state_info_item(&self, item: &Value) {
        if item["deviceId"].as_i64().is_some() {
            self.apply_device_state(item);
        } else if let Some(id) = item["roomId"].as_i64() {
            match self.rooms.get(&id) {
                Some(room) => room.apply_state(item),
                None => trace!(room_id = id, "state for unknown room, ignored"),
            }
        } else if let Some(id) = item["compId"].as_i64() {
            match self.components.get(&id) {
                Some(component) => component.apply_state(item),
                None => trace!(comp_id = id, "state for unknown component, ignored"),
            }
        } else {
            debug!(%item, "state item with no recognisable id");
        }
    }

    /// A bulk inventory frame: upsert then project every section.
    /// Feeding the same inventory twice leaves the maps unchanged.
    pub(crate) fn apply_all_data(&self, payload: &Value) {
        for entry in array(payload, "devices") {
            self.upsert_device(entry);
        }
        for entry in array(payload, "comps") {
            self.upsert_component(entry);
        }
        for entry in array(payload, "rooms") {
            self.upsert_room(entry);
        }
        for entry in array(payload, "roomHeating") {
            self.upsert_room(entry);
        }
    }

    // ── Upsert-then-project ──────────────────────────────────────────

    fn upsert_device(&self, entry: &Value) {
        let Some(id) = entry["deviceId"].as_i64() else {
            warn!("device entry without deviceId");
            return;
        };
        if !self.devices.contains_key(&id) {
            match Device::from_catalogue(entry, self.link.clone()) {
                Some(device) => {
                    trace!(device_id = id, "new device");
                    self.devices.insert(id, device);
                }
                None => {
                    warn!(device_id = id, "unclassifiable device entry");
                    return;
                }
            }
        }
        if let Some(device) = self.devices.get(&id) {
            device.apply_state(entry);
        }
    }

    fn upsert_component(&self, entry: &Value) {
        let Some(id) = entry["compId"].as_i64() else {
            warn!("component entry without compId");
            return;
        };
        if !self.components.contains_key(&id) {
            let comp_type = entry["compType"].as_i64().unwrap_or_default() as i32;
            let name = entry["name"].as_str().unwrap_or_default().to_owned();
            self.components.insert(id, Arc::new(Component::new(id, comp_type, name)));
        }
        if let Some(component) = self.components.get(&id) {
            component.apply_state(entry);
        }
    }

    fn upsert_room(&self, entry: &Value) {
        let Some(id) = entry["roomId"].as_i64() else {
            warn!("room entry without roomId");
            return;
        };
        if !self.rooms.contains_key(&id) {
            let name = entry["name"].as_str().unwrap_or_default().to_owned();
            self.rooms.insert(id, Arc::new(Room::new(id, name, self.link.clone())));
        }
        if let Some(room) = self.rooms.get(&id) {
            room.apply_state(entry);
        }
    }
}

fn array<'a>(payload: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    payload[key].as_array().map(|v| v.iter()).into_iter().flatten()
}
