// ── Entity domain type ──

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::entity_id::EntityId;
use super::state::{AttributeValue, Attributes, DeviceClass, EntityState};
use crate::classify::Family;

/// The physical device an entity belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Hub id (`agt`).
    pub hub: String,
    /// Device id (`me`), unique within the hub.
    pub device: String,
    /// Vendor family code (`devtype`).
    pub devtype: String,
    pub name: String,
    pub version: Option<String>,
}

/// One host-framework entity: a device, or one sub-channel of a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub device: DeviceInfo,
    pub family: Family,
    /// Sub-channel the entity reads from and writes to. `None` for
    /// entities that aggregate every channel of their device.
    pub channel: Option<String>,
    pub device_class: Option<DeviceClass>,
    pub state: EntityState,
    pub attributes: Attributes,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Entity {
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Merge `delta` into this entity. Returns `true` if anything changed.
    pub fn apply(&mut self, delta: &StateDelta, at: DateTime<Utc>) -> bool {
        let mut changed = false;

        if let Some(state) = delta.state {
            if self.state != state {
                self.state = state;
                changed = true;
            }
        }

        for (key, value) in &delta.attributes {
            if self.attributes.get(key) != Some(value) {
                self.attributes.insert(key.clone(), value.clone());
                changed = true;
            }
        }

        if changed {
            self.last_updated = Some(at);
        }
        changed
    }
}

// ── StateDelta ───────────────────────────────────────────────────────

/// A partial update: an optional new state plus attribute writes.
///
/// Attributes absent from the delta keep their previous value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub state: Option<EntityState>,
    pub attributes: Attributes,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(state: EntityState) -> Self {
        Self {
            state: Some(state),
            attributes: Attributes::new(),
        }
    }

    #[must_use]
    pub fn with_attr(mut self, key: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.to_owned(), value.into());
        self
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<AttributeValue>) {
        self.attributes.insert(key.to_owned(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.attributes.is_empty()
    }

}
