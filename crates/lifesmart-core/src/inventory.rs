// ── Inventory loading ──
//
// Turns the account's device list into registered entities. Each device
// channel is classified, channels that share an identity are folded into
// one entity, and every reading is decoded in key order so the entity
// starts out with the cloud's current state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use lifesmart_api::{RawDevice, Scene};
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::DeviceApi;
use crate::classify::{AUTOMATION_KEY, AUTOMATION_RULE, AUTOMATION_TYPE, Family, Rule, classify, is_supported_type};
use crate::codec::ColorTempRange;
use crate::config::IntegrationConfig;
use crate::decode::{attr, decode, temperature_range};
use crate::error::CoreError;
use crate::identity::{build_identity, identity_for};
use crate::model::{Attributes, DeviceInfo, Entity, EntityId, EntityState};

/// What one inventory pass produced.
#[derive(Debug, Default)]
pub struct Inventory {
    /// Devices kept after exclusion.
    pub devices: Vec<RawDevice>,
    /// Entities built from those devices plus included automations.
    pub entities: Vec<Entity>,
}

/// Fetch devices and automations and build their entities.
pub async fn load<A: DeviceApi>(api: &A, config: &IntegrationConfig) -> Result<Inventory, CoreError> {
    let now = Utc::now();
    let mut inventory = Inventory::default();

    for device in api.get_devices().await? {
        if config.is_excluded(&device.agt, &device.me) {
            debug!(hub = %device.agt, device = %device.me, "device excluded");
            continue;
        }
        if !is_supported_type(&device.devtype) {
            debug!(
                hub = %device.agt,
                device = %device.me,
                devtype = %device.devtype,
                "device type not supported"
            );
        }
        inventory.entities.extend(build_entities(&device, now));
        inventory.devices.push(device);
    }

    for hub in &config.ai_include_hubs {
        let scenes = api.get_scenes(hub).await?;
        let included = scenes
            .iter()
            .filter(|scene| config.is_automation_included(hub, &scene.id));
        for scene in included {
            inventory.entities.push(automation_entity(hub, scene));
        }
    }

    attach_remotes(api, &inventory.devices, &mut inventory.entities).await;

    debug!(
        devices = inventory.devices.len(),
        entities = inventory.entities.len(),
        "inventory loaded"
    );
    Ok(inventory)
}

/// Every entity one device exposes, with its current readings decoded.
pub fn build_entities(device: &RawDevice, at: DateTime<Utc>) -> Vec<Entity> {
    let mut built: BTreeMap<EntityId, Entity> = BTreeMap::new();

    for (key, point) in &device.data {
        let Some(rule) = classify(&device.devtype, key) else {
            continue;
        };
        let id = identity_for(rule, &device.devtype, &device.agt, &device.me, key);
        let entity = built
            .entry(id.clone())
            .or_insert_with(|| new_entity(id, rule, device, key, point.name.as_deref()));

        match decode(rule, point, entity) {
            Ok(delta) => {
                entity.apply(&delta, at);
            }
            Err(e) => {
                warn!(entity = %entity.id, key, error = %e, "skipping undecodable reading");
            }
        }
    }

    built.into_values().collect()
}

/// Switch entity for one hub automation.
pub fn automation_entity(hub: &str, scene: &Scene) -> Entity {
    let id = build_identity(
        AUTOMATION_RULE.kind,
        AUTOMATION_TYPE,
        hub,
        &scene.id,
        Some(AUTOMATION_KEY),
    );
    Entity {
        id,
        name: scene.name.clone(),
        device: DeviceInfo {
            hub: hub.to_owned(),
            device: scene.id.clone(),
            devtype: AUTOMATION_TYPE.to_owned(),
            name: scene.name.clone(),
            version: None,
        },
        family: Family::Automation,
        channel: Some(AUTOMATION_KEY.to_owned()),
        device_class: None,
        state: EntityState::Off,
        attributes: Attributes::new(),
        last_updated: None,
    }
}

fn new_entity(id: EntityId, rule: &Rule, device: &RawDevice, key: &str, sub_name: Option<&str>) -> Entity {
    // Aggregated entities take the device name; per-channel ones prefer
    // the channel's own label.
    let name = match (rule.identity_key(key), sub_name) {
        (Some(_), Some(label)) if !label.is_empty() && rule.family != Family::Dimmer => label.to_owned(),
        _ => device.name.clone(),
    };

    Entity {
        id,
        name,
        device: DeviceInfo {
            hub: device.agt.clone(),
            device: device.me.clone(),
            devtype: device.devtype.clone(),
            name: device.name.clone(),
            version: device.ver.clone(),
        },
        family: rule.family,
        channel: rule.identity_key(key).map(str::to_owned),
        device_class: rule.class,
        state: EntityState::Unknown,
        attributes: static_attributes(rule),
        last_updated: None,
    }
}

fn static_attributes(rule: &Rule) -> Attributes {
    let mut attributes = Attributes::new();

    if let Some(unit) = rule.class.and_then(|class| class.unit()) {
        attributes.insert(attr::UNIT.to_owned(), unit.into());
    }
    if let Some((min, max)) = temperature_range(rule.family) {
        attributes.insert(attr::MIN_TEMP.to_owned(), min.into());
        attributes.insert(attr::MAX_TEMP.to_owned(), max.into());
    }
    if rule.family == Family::Dimmer {
        let range = ColorTempRange::WARM_WHITE_DIMMER;
        attributes.insert(attr::MIN_MIREDS.to_owned(), range.min_mireds.into());
        attributes.insert(attr::MAX_MIREDS.to_owned(), range.max_mireds.into());
    }
    attributes
}

/// Attach each spot hub's IR remote list. Failures only cost the attribute.
async fn attach_remotes<A: DeviceApi>(api: &A, devices: &[RawDevice], entities: &mut [Entity]) {
    let mut lists: BTreeMap<&str, Value> = BTreeMap::new();

    for device in devices {
        let is_spot = classify(&device.devtype, "RGB").is_some_and(|rule| rule.family == Family::Spot);
        if !is_spot || lists.contains_key(device.agt.as_str()) {
            continue;
        }
        match api.get_remote_list(&device.agt).await {
            Ok(list) => {
                lists.insert(&device.agt, list);
            }
            Err(e) => warn!(hub = %device.agt, error = %e, "remote list unavailable"),
        }
    }

    for entity in entities.iter_mut().filter(|e| e.family == Family::Spot) {
        if let Some(list) = lists.get(entity.device.hub.as_str()) {
            entity.attributes.insert(attr::REMOTES.to_owned(), list.clone().into());
        }
    }
}
