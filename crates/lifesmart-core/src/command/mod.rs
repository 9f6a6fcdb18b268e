// ── Command API ──
//
// All write operations flow through a unified `Command` enum. Entity
// commands are encoded against the entity's family into one or more
// vendor calls; service commands map to exactly one call.

mod encode;

pub use encode::{Plan, encode};

use lifesmart_api::{AcKeys, IoWrite, IrCodes, IrKeys};

use crate::codec::{Hs, Rgb, Rgbw};
use crate::model::{EntityId, FanSpeed, HvacMode};

/// A high-level intent.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // ── Entity commands ──────────────────────────────────────────
    TurnOn { entity: EntityId },
    TurnOff { entity: EntityId },
    SetBrightness { entity: EntityId, brightness: u8 },
    /// Color temperature in mireds.
    SetColorTemp { entity: EntityId, mireds: u32 },
    SetRgb { entity: EntityId, rgb: Rgb },
    SetRgbw { entity: EntityId, rgbw: Rgbw },
    SetHs { entity: EntityId, hs: Hs },
    SetHvacMode { entity: EntityId, mode: HvacMode },
    SetTargetTemperature { entity: EntityId, celsius: f64 },
    SetFanMode { entity: EntityId, fan: FanSpeed },
    OpenCover { entity: EntityId },
    CloseCover { entity: EntityId },
    StopCover { entity: EntityId },
    /// Position in percent, 0–100.
    SetCoverPosition { entity: EntityId, position: u8 },

    // ── Service commands ─────────────────────────────────────────
    SendIrKeys(IrKeys),
    SendIrCodes(IrCodes),
    SendAcKeys(AcKeys),
    SetScene { hub: String, scene: String },
}

impl Command {
    /// The entity this command targets, if any.
    pub fn entity(&self) -> Option<&EntityId> {
        match self {
            Self::TurnOn { entity }
            | Self::TurnOff { entity }
            | Self::SetBrightness { entity, .. }
            | Self::SetColorTemp { entity, .. }
            | Self::SetRgb { entity, .. }
            | Self::SetRgbw { entity, .. }
            | Self::SetHs { entity, .. }
            | Self::SetHvacMode { entity, .. }
            | Self::SetTargetTemperature { entity, .. }
            | Self::SetFanMode { entity, .. }
            | Self::OpenCover { entity }
            | Self::CloseCover { entity }
            | Self::StopCover { entity }
            | Self::SetCoverPosition { entity, .. } => Some(entity),
            Self::SendIrKeys(_) | Self::SendIrCodes(_) | Self::SendAcKeys(_) | Self::SetScene { .. } => None,
        }
    }

    /// Operation name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TurnOn { .. } => "turn_on",
            Self::TurnOff { .. } => "turn_off",
            Self::SetBrightness { .. } => "set_brightness",
            Self::SetColorTemp { .. } => "set_color_temp",
            Self::SetRgb { .. } => "set_rgb",
            Self::SetRgbw { .. } => "set_rgbw",
            Self::SetHs { .. } => "set_hs",
            Self::SetHvacMode { .. } => "set_hvac_mode",
            Self::SetTargetTemperature { .. } => "set_temperature",
            Self::SetFanMode { .. } => "set_fan_mode",
            Self::OpenCover { .. } => "open_cover",
            Self::CloseCover { .. } => "close_cover",
            Self::StopCover { .. } => "stop_cover",
            Self::SetCoverPosition { .. } => "set_cover_position",
            Self::SendIrKeys(_) => "send_keys",
            Self::SendIrCodes(_) => "send_codes",
            Self::SendAcKeys(_) => "send_ackeys",
            Self::SetScene { .. } => "set_scene",
        }
    }
}

/// One signed vendor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Io(IoWrite),
    Scene { hub: String, scene: String },
    IrKeys(IrKeys),
    IrCodes(IrCodes),
    AcKeys(AcKeys),
}

/// Result of a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Vendor result code of the last submitted call.
    pub code: i64,
    /// Number of calls submitted.
    pub submitted: usize,
    /// Whether the optimistic state change was applied.
    pub applied: bool,
}
