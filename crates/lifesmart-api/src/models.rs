// Wire models for the LifeSmart cloud
//
// Field names follow the vendor's JSON (`agt`, `me`, `idx`, `devtype`).
// Numeric fields are deserialized leniently: the cloud sends integers,
// floats, and numeric strings interchangeably for the same field.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

// ── Device inventory ─────────────────────────────────────────────────

/// One device as reported by `EpGetAll` / `EpGet`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDevice {
    /// Hub id.
    pub agt: String,
    /// Device id, unique within its hub.
    pub me: String,
    /// Family code such as `SL_SW_IF3` or `SL_LK_LS`.
    pub devtype: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ver: Option<String>,
    /// Online status as reported by the hub.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub stat: Option<i64>,
    /// IO points keyed by sub-channel (`"L1"`, `"RGB"`, `"EVTLO"`, ...).
    #[serde(default)]
    pub data: BTreeMap<String, IoPoint>,
}

/// State of a single IO point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IoPoint {
    /// Type code. The low bit doubles as the on/off flag.
    #[serde(rename = "type", default, deserialize_with = "lenient_i64")]
    pub kind: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub val: Option<i64>,
    /// Engineering value for sensors (temperature, humidity, power, ...).
    #[serde(default, deserialize_with = "lenient_f64")]
    pub v: Option<f64>,
    /// Timestamp in milliseconds.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub ts: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A scene stored on a hub (`SceneGet`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

// ── Push frames ──────────────────────────────────────────────────────

/// Outer envelope of every push frame: `{type, msg}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PushFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub msg: Option<serde_json::Value>,
}

impl PushFrame {
    pub const IO: &'static str = "io";

    pub fn is_io(&self) -> bool {
        self.kind == Self::IO
    }
}

/// Payload of an `io` frame: one IO point changed on one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoMessage {
    pub devtype: String,
    pub agt: String,
    pub me: String,
    /// Sub-channel key. `"s"` marks an automation (AI) event.
    pub idx: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_i64")]
    pub kind: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub val: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub v: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub ts: Option<i64>,
    /// Automation run status (3 = running, 4 = stopped).
    #[serde(default, deserialize_with = "lenient_i64")]
    pub stat: Option<i64>,
}

impl IoMessage {
    /// View the changed point the way it appears inside a [`RawDevice`].
    pub fn point(&self) -> IoPoint {
        IoPoint {
            kind: self.kind,
            val: self.val,
            v: self.v,
            ts: self.ts,
            name: None,
        }
    }
}

// ── Lenient number helpers ───────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Int(i64),
    Float(f64),
    Text(String),
    Other(serde::de::IgnoredAny),
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<Number>::deserialize(d)? {
        Some(Number::Int(i)) => Some(i),
        Some(Number::Float(f)) if f.is_finite() => Some(f.round() as i64),
        Some(Number::Text(s)) => parse_int_text(&s),
        _ => None,
    })
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Number>::deserialize(d)? {
        Some(Number::Int(i)) => Some(i as f64),
        Some(Number::Float(f)) => Some(f),
        Some(Number::Text(s)) => s.trim().parse().ok(),
        Some(Number::Other(_)) | None => None,
    })
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Number::deserialize(d)? {
        Number::Int(i) => i.to_string(),
        Number::Float(f) => f.to_string(),
        Number::Text(s) => s,
        Number::Other(_) => String::new(),
    })
}

/// Accepts decimal and `0x`-prefixed hex.
fn parse_int_text(s: &str) -> Option<i64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}
