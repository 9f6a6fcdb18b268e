// ── Entity state and attributes ──

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

// ── Primary state ────────────────────────────────────────────────────

/// The primary state of an entity, as the host framework displays it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "value")]
pub enum EntityState {
    /// No reading has been decoded yet.
    #[default]
    Unknown,
    On,
    Off,
    Number(f64),
    Cover(CoverMotion),
    Hvac(HvacMode),
}

impl EntityState {
    pub fn from_bool(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    /// `Some(true)` for on-like states, `None` when the state has no
    /// on/off reading.
    pub fn is_on(&self) -> Option<bool> {
        match self {
            Self::On => Some(true),
            Self::Off => Some(false),
            Self::Hvac(mode) => Some(*mode != HvacMode::Off),
            Self::Unknown | Self::Number(_) | Self::Cover(_) => None,
        }
    }
}

/// Climate operating mode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    Off,
    Auto,
    Cool,
    Heat,
    Dry,
    FanOnly,
}

/// Fan speed bucket shared by every climate family.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FanSpeed {
    Low,
    Medium,
    High,
}

/// Cover position reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CoverMotion {
    Open,
    Closed,
    Opening,
    Closing,
}

/// Device class hint attached to binary sensors and sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    // Binary sensors
    Door,
    Vibration,
    Motion,
    Smoke,
    Lock,
    Problem,
    // Sensors
    Battery,
    Temperature,
    Humidity,
    Illuminance,
    CarbonDioxide,
    VolatileOrganicCompounds,
    Energy,
    Power,
}

impl DeviceClass {
    /// Unit of measurement reported alongside numeric readings.
    pub fn unit(self) -> Option<&'static str> {
        match self {
            Self::Battery | Self::Humidity => Some("%"),
            Self::Temperature => Some("°C"),
            Self::Illuminance => Some("lx"),
            Self::CarbonDioxide => Some("ppm"),
            Self::VolatileOrganicCompounds => Some("mg/m³"),
            Self::Energy => Some("kWh"),
            Self::Power => Some("W"),
            _ => None,
        }
    }
}

// ── Attributes ───────────────────────────────────────────────────────

/// A single attribute value.
///
/// Serialized untagged so the host sees plain JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Json(serde_json::Value),
}

/// Ordered attribute map.
pub type Attributes = BTreeMap<String, AttributeValue>;

impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u8> for AttributeValue {
    fn from(v: u8) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u16> for AttributeValue {
    fn from(v: u16) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for AttributeValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}
