// ── Entity identity ──
//
// `EntityId` is the routing key shared by the inventory loader, the
// update router and the host framework: `<kind>.<object_id>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Host-framework platform an entity belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Switch,
    BinarySensor,
    Sensor,
    Cover,
    Light,
    Climate,
}

/// Canonical entity identifier, e.g. `switch.sl_sw_if3_hub1_2d11_l1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    kind: EntityKind,
    object_id: String,
}

impl EntityId {
    /// Wrap an already-normalized object id. See [`crate::identity`] for
    /// the builder that performs normalization.
    pub fn new(kind: EntityKind, object_id: impl Into<String>) -> Self {
        Self {
            kind,
            object_id: object_id.into(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.object_id)
    }
}

/// Error returned when a string is not `<kind>.<object_id>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid entity id `{0}`")]
pub struct ParseEntityIdError(String);

impl FromStr for EntityId {
    type Err = ParseEntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, object_id) = s.split_once('.').ok_or_else(|| ParseEntityIdError(s.to_owned()))?;
        if object_id.is_empty() {
            return Err(ParseEntityIdError(s.to_owned()));
        }
        let kind = kind
            .parse::<EntityKind>()
            .map_err(|_| ParseEntityIdError(s.to_owned()))?;
        Ok(Self::new(kind, object_id))
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
