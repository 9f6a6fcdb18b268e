// ── Wire codec ──
//
// Pure conversions between the vendor's packed numeric values and the
// semantic values entities expose. Inputs come straight off the wire, so
// every decoder validates its range instead of trusting the cloud.

use strum::{AsRefStr, Display};
use thiserror::Error;

use crate::model::{CoverMotion, FanSpeed};

/// A wire value that cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{field} value {value} is out of range")]
    OutOfRange { field: &'static str, value: i64 },

    #[error("unknown {field} code {value}")]
    UnknownCode { field: &'static str, value: i64 },
}

// ── Type parity ──────────────────────────────────────────────────────

/// Odd type codes mean "on".
pub fn is_on(kind: i64) -> bool {
    kind & 1 == 1
}

// ── Packed colors ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgbw {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub w: u8,
}

/// Hue (degrees, 0–360) and saturation (percent, 0–100).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hs {
    pub hue: f64,
    pub saturation: f64,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl Rgbw {
    pub const fn new(r: u8, g: u8, b: u8, w: u8) -> Self {
        Self { r, g, b, w }
    }
}

/// Validate that `val` fits a 32-bit WRGB word.
pub fn packed_word(val: i64) -> Result<u32, DecodeError> {
    u32::try_from(val).map_err(|_| DecodeError::OutOfRange { field: "WRGB", value: val })
}

/// Byte 0 is white, bytes 1–3 are R, G, B. White is dropped.
pub fn unpack_rgb(word: u32) -> Rgb {
    let [_, r, g, b] = word.to_be_bytes();
    Rgb { r, g, b }
}

pub fn unpack_rgbw(word: u32) -> Rgbw {
    let [w, r, g, b] = word.to_be_bytes();
    Rgbw { r, g, b, w }
}

/// Inverse of [`unpack_rgb`]; white is encoded as 0.
pub fn pack_rgb(rgb: Rgb) -> u32 {
    u32::from_be_bytes([0, rgb.r, rgb.g, rgb.b])
}

pub fn pack_rgbw(rgbw: Rgbw) -> u32 {
    u32::from_be_bytes([rgbw.w, rgbw.r, rgbw.g, rgbw.b])
}

#[allow(clippy::many_single_char_names)]
pub fn rgb_to_hs(rgb: Rgb) -> Hs {
    let r = f64::from(rgb.r) / 255.0;
    let g = f64::from(rgb.g) / 255.0;
    let b = f64::from(rgb.b) / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if (max - r).abs() < f64::EPSILON {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if (max - g).abs() < f64::EPSILON {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max * 100.0 };

    Hs {
        hue: round_to(hue, 3),
        saturation: round_to(saturation, 3),
    }
}

/// Full-brightness RGB for a hue/saturation pair.
#[allow(
    clippy::many_single_char_names,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
pub fn hs_to_rgb(hs: Hs) -> Rgb {
    let h = hs.hue.rem_euclid(360.0) / 60.0;
    let s = (hs.saturation / 100.0).clamp(0.0, 1.0);
    let c = s;
    let x = c * (1.0 - ((h % 2.0) - 1.0).abs());
    let m = 1.0 - c;

    let (r, g, b) = match h as u8 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let byte = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgb::new(byte(r), byte(g), byte(b))
}

// ── Color temperature ────────────────────────────────────────────────

/// Mired bounds of a tunable-white channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTempRange {
    /// Coolest setting.
    pub min_mireds: u32,
    /// Warmest setting.
    pub max_mireds: u32,
}

impl ColorTempRange {
    /// 2700 K – 6500 K, truncated to whole mireds (153–370).
    pub const WARM_WHITE_DIMMER: Self = Self {
        min_mireds: 1_000_000 / 6500,
        max_mireds: 1_000_000 / 2700,
    };

    fn span(self) -> f64 {
        f64::from(self.max_mireds.saturating_sub(self.min_mireds))
    }
}

/// Channel level 0–255 to mireds. Level 0 is the warmest setting.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
pub fn color_temp_from_level(level: u8, range: ColorTempRange) -> u32 {
    let ratio = 1.0 - f64::from(level) / 255.0;
    (range.span() * ratio).trunc() as u32 + range.min_mireds
}

/// Mireds to channel level, clamping to the range first.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
pub fn level_from_color_temp(mireds: u32, range: ColorTempRange) -> u8 {
    let span = range.span();
    if span == 0.0 {
        return 0;
    }
    let clamped = mireds.clamp(range.min_mireds, range.max_mireds);
    let offset = f64::from(clamped - range.min_mireds);
    ((1.0 - offset / span) * 255.0).trunc().clamp(0.0, 255.0) as u8
}

/// Validate a 0–255 channel level.
pub fn level(val: i64) -> Result<u8, DecodeError> {
    u8::try_from(val).map_err(|_| DecodeError::OutOfRange { field: "level", value: val })
}

// ── Fixed point ──────────────────────────────────────────────────────

/// Tenths of a degree to degrees, one decimal place.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn decode_tenths(val: i64) -> f64 {
    round_to(val as f64 / 10.0, 1)
}

/// Degrees to tenths, rounded to the nearest integer.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub fn encode_tenths(celsius: f64) -> i64 {
    (celsius * 10.0).round() as i64
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn round_to(value: f64, places: u8) -> f64 {
    let scale = 10f64.powi(i32::from(places));
    (value * scale).round() / scale
}

// ── Door lock events ─────────────────────────────────────────────────

/// How a lock was opened, from the top four bits of the event word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum UnlockMethod {
    #[strum(serialize = "Undefined")]
    Undefined,
    #[strum(serialize = "Password")]
    Password,
    #[strum(serialize = "Fingerprint")]
    Fingerprint,
    #[strum(serialize = "NFC")]
    Nfc,
    #[strum(serialize = "Mechanical key")]
    MechanicalKey,
    #[strum(serialize = "Remote unlocking")]
    RemoteUnlocking,
    #[strum(serialize = "One-button opening")]
    OneButtonOpening,
    #[strum(serialize = "APP")]
    App,
    #[strum(serialize = "Bluetooth")]
    Bluetooth,
    #[strum(serialize = "Manual unlock")]
    Manual,
    #[strum(serialize = "Error")]
    Error,
}

impl UnlockMethod {
    pub const ERROR_CODE: u8 = 15;

    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Password,
            2 => Self::Fingerprint,
            3 => Self::Nfc,
            4 => Self::MechanicalKey,
            5 => Self::RemoteUnlocking,
            6 => Self::OneButtonOpening,
            7 => Self::App,
            8 => Self::Bluetooth,
            9 => Self::Manual,
            Self::ERROR_CODE => Self::Error,
            _ => Self::Undefined,
        }
    }
}

/// A decoded `EVTLO` word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockEvent {
    pub method: UnlockMethod,
    pub method_code: u8,
    /// Lock-local user slot, low 12 bits.
    pub user: u16,
    /// The type code was odd: the lock reports itself open.
    pub unlocked: bool,
    pub success: bool,
}

pub fn decode_lock_event(val: i64, kind: i64) -> Result<LockEvent, DecodeError> {
    let word = u32::try_from(val).map_err(|_| DecodeError::OutOfRange { field: "EVTLO", value: val })?;
    let method_code = u8::try_from((word >> 12) & 0xF).unwrap_or_default();
    let user = u16::try_from(word & 0xFFF).unwrap_or_default();
    let unlocked = is_on(kind);

    Ok(LockEvent {
        method: UnlockMethod::from_code(method_code),
        method_code,
        user,
        unlocked,
        success: unlocked && user != 0 && method_code != UnlockMethod::ERROR_CODE,
    })
}

// ── Fan speed ────────────────────────────────────────────────────────

pub fn fan_speed_from_level(level: i64) -> FanSpeed {
    match level {
        l if l < 30 => FanSpeed::Low,
        l if l < 65 => FanSpeed::Medium,
        _ => FanSpeed::High,
    }
}

/// Representative wire level for a bucket.
pub fn fan_level(speed: FanSpeed) -> i64 {
    match speed {
        FanSpeed::Low => 15,
        FanSpeed::Medium => 45,
        FanSpeed::High => 75,
    }
}

// ── Cover ────────────────────────────────────────────────────────────

const COVER_POSITION_MASK: i64 = 0x7F;
const COVER_OPENING_BIT: i64 = 0x80;

/// Position (0–127) and motion of a curtain motor.
pub fn decode_cover(val: i64, kind: i64) -> (u8, CoverMotion) {
    let position = u8::try_from(val & COVER_POSITION_MASK).unwrap_or_default();
    let motion = if is_on(kind) {
        if val & COVER_OPENING_BIT == 0 {
            CoverMotion::Closing
        } else {
            CoverMotion::Opening
        }
    } else if position > 0 {
        CoverMotion::Open
    } else {
        CoverMotion::Closed
    };
    (position, motion)
}
