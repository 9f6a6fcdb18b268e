// ── Command encoding ──
//
// Maps an intent onto vendor writes for the target entity's family, plus
// the state change to apply once every write is confirmed.

use lifesmart_api::IoWrite;
use serde_json::json;

use super::{ApiCall, Command};
use crate::classify::{Family, Strategy, classify};
use crate::codec::{self, ColorTempRange, Rgb, Rgbw, encode_tenths, fan_level};
use crate::decode::{VRV_MODES, air_board_mode_code, attr, last_mode, temperature_range};
use crate::error::CoreError;
use crate::model::{CoverMotion, Entity, EntityState, HvacMode, StateDelta};

// ── Type codes ───────────────────────────────────────────────────────

const TYPE_ON: u8 = 0x81;
const TYPE_OFF: u8 = 0x80;
const TYPE_COLOR_ON: u8 = 0xff;
const TYPE_LEVEL: u8 = 0xcf;
const TYPE_ENUM: u8 = 0xce;
const TYPE_TEMPERATURE: u8 = 0x88;

const COVER_KEY: &str = "P1";
const COVER_STOP: i64 = 0x80;

/// Vendor calls for one command, submitted in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub calls: Vec<ApiCall>,
    /// Applied only after every call returned code 0.
    pub optimistic: StateDelta,
}

impl Plan {
    fn single(call: ApiCall) -> Self {
        Self {
            calls: vec![call],
            optimistic: StateDelta::new(),
        }
    }
}

/// Encode `command`. Entity commands need the target entity.
pub fn encode(command: &Command, entity: Option<&Entity>) -> Result<Plan, CoreError> {
    match command {
        Command::SendIrKeys(keys) => return Ok(Plan::single(ApiCall::IrKeys(keys.clone()))),
        Command::SendIrCodes(codes) => return Ok(Plan::single(ApiCall::IrCodes(codes.clone()))),
        Command::SendAcKeys(keys) => return Ok(Plan::single(ApiCall::AcKeys(keys.clone()))),
        Command::SetScene { hub, scene } => {
            return Ok(Plan::single(ApiCall::Scene {
                hub: hub.clone(),
                scene: scene.clone(),
            }));
        }
        _ => {}
    }

    let Some(entity) = entity else {
        return Err(CoreError::ValidationFailed {
            message: format!("{} needs a target entity", command.name()),
        });
    };

    let encoder = Encoder { entity, command };
    match entity.family {
        Family::Switch | Family::SmartPlug => encoder.switch(),
        Family::LightSwitch | Family::Spot => encoder.color_light(),
        Family::Dimmer => encoder.dimmer(),
        Family::Cover => encoder.cover(),
        Family::Vrv => encoder.vrv(),
        Family::Thermostat => encoder.thermostat(),
        Family::AirBoard => encoder.air_board(),
        Family::Automation => encoder.automation(),
        Family::Guard
        | Family::Motion
        | Family::Smoke
        | Family::GenericController
        | Family::Lock
        | Family::Environment
        | Family::Gas
        | Family::ExtraReading => Err(encoder.unsupported()),
    }
}

struct Encoder<'a> {
    entity: &'a Entity,
    command: &'a Command,
}

impl Encoder<'_> {
    fn unsupported(&self) -> CoreError {
        CoreError::Unsupported {
            entity: self.entity.id.clone(),
            operation: self.command.name().to_owned(),
        }
    }

    fn io(&self, idx: &str, kind: u8, val: i64) -> ApiCall {
        ApiCall::Io(IoWrite {
            agt: self.entity.device.hub.clone(),
            me: self.entity.device.device.clone(),
            idx: idx.to_owned(),
            kind,
            val,
        })
    }

    fn channel(&self) -> Result<&str, CoreError> {
        self.entity.channel.as_deref().ok_or_else(|| self.unsupported())
    }

    fn power(&self, idx: &str, on: bool) -> ApiCall {
        if on {
            self.io(idx, TYPE_ON, 1)
        } else {
            self.io(idx, TYPE_OFF, 0)
        }
    }

    // ── Switches ─────────────────────────────────────────────────────

    fn switch(&self) -> Result<Plan, CoreError> {
        let on = match self.command {
            Command::TurnOn { .. } => true,
            Command::TurnOff { .. } => false,
            _ => return Err(self.unsupported()),
        };
        let idx = self.channel()?;
        // Plug sensor channels share the family but are read-only.
        if self.entity.id.kind() != crate::model::EntityKind::Switch {
            return Err(self.unsupported());
        }
        Ok(Plan {
            calls: vec![self.power(idx, on)],
            optimistic: StateDelta::state(EntityState::from_bool(on)),
        })
    }

    // ── Lights ───────────────────────────────────────────────────────

    fn color_light(&self) -> Result<Plan, CoreError> {
        let idx = self.channel()?;
        let strategy = classify(&self.entity.device.devtype, idx)
            .map(|rule| rule.strategy)
            .ok_or_else(|| self.unsupported())?;

        let rgb = match self.command {
            Command::TurnOn { .. } => {
                return Ok(Plan {
                    calls: vec![self.power(idx, true)],
                    optimistic: StateDelta::state(EntityState::On),
                });
            }
            // Plain power-off; the stored color word is left alone.
            Command::TurnOff { .. } => {
                return Ok(Plan {
                    calls: vec![self.power(idx, false)],
                    optimistic: StateDelta::state(EntityState::Off),
                });
            }
            Command::SetRgbw { rgbw, .. } if strategy == Strategy::Rgbw => {
                let optimistic = StateDelta::state(EntityState::On)
                    .with_attr(attr::RGBW_COLOR, json!([rgbw.r, rgbw.g, rgbw.b, rgbw.w]));
                return Ok(Plan {
                    calls: vec![self.io(idx, TYPE_COLOR_ON, i64::from(codec::pack_rgbw(*rgbw)))],
                    optimistic,
                });
            }
            Command::SetRgb { rgb, .. } => *rgb,
            Command::SetHs { hs, .. } => codec::hs_to_rgb(*hs),
            _ => return Err(self.unsupported()),
        };

        let mut optimistic = StateDelta::state(EntityState::On);
        let word = match strategy {
            Strategy::Rgbw => {
                let rgbw = Rgbw::new(rgb.r, rgb.g, rgb.b, 0);
                optimistic.set_attr(attr::RGBW_COLOR, json!([rgbw.r, rgbw.g, rgbw.b, rgbw.w]));
                codec::pack_rgbw(rgbw)
            }
            Strategy::Hs => {
                let hs = codec::rgb_to_hs(rgb);
                optimistic.set_attr(attr::HS_COLOR, json!([hs.hue, hs.saturation]));
                codec::pack_rgb(rgb)
            }
            Strategy::Rgb | Strategy::RgbOptional => {
                optimistic.set_attr(attr::RGB_COLOR, rgb_json(rgb));
                codec::pack_rgb(rgb)
            }
            _ => return Err(self.unsupported()),
        };

        Ok(Plan {
            calls: vec![self.io(idx, TYPE_COLOR_ON, i64::from(word))],
            optimistic,
        })
    }

    fn dimmer(&self) -> Result<Plan, CoreError> {
        const LEVEL: &str = "P1";
        const TEMP: &str = "P2";

        let (calls, optimistic) = match self.command {
            Command::TurnOn { .. } => (vec![self.power(LEVEL, true)], StateDelta::state(EntityState::On)),
            Command::TurnOff { .. } => (vec![self.power(LEVEL, false)], StateDelta::state(EntityState::Off)),
            Command::SetBrightness { brightness, .. } => (
                vec![
                    self.io(LEVEL, TYPE_LEVEL, i64::from(*brightness)),
                    self.power(LEVEL, true),
                ],
                StateDelta::state(EntityState::On).with_attr(attr::BRIGHTNESS, *brightness),
            ),
            Command::SetColorTemp { mireds, .. } => {
                let range = ColorTempRange::WARM_WHITE_DIMMER;
                let level = codec::level_from_color_temp(*mireds, range);
                (
                    vec![self.io(TEMP, TYPE_LEVEL, i64::from(level)), self.power(LEVEL, true)],
                    StateDelta::state(EntityState::On)
                        .with_attr(attr::COLOR_TEMP, (*mireds).clamp(range.min_mireds, range.max_mireds)),
                )
            }
            _ => return Err(self.unsupported()),
        };
        Ok(Plan { calls, optimistic })
    }

    // ── Covers ───────────────────────────────────────────────────────

    fn cover(&self) -> Result<Plan, CoreError> {
        let (call, optimistic) = match self.command {
            Command::OpenCover { .. } => (
                self.io(COVER_KEY, TYPE_LEVEL, 100),
                StateDelta::state(EntityState::Cover(CoverMotion::Opening)),
            ),
            Command::CloseCover { .. } => (
                self.io(COVER_KEY, TYPE_LEVEL, 0),
                StateDelta::state(EntityState::Cover(CoverMotion::Closing)),
            ),
            Command::StopCover { .. } => (self.io(COVER_KEY, TYPE_ENUM, COVER_STOP), StateDelta::new()),
            Command::SetCoverPosition { position, .. } => {
                if *position > 100 {
                    return Err(CoreError::ValidationFailed {
                        message: format!("cover position {position} is above 100"),
                    });
                }
                (
                    self.io(COVER_KEY, TYPE_LEVEL, i64::from(*position)),
                    StateDelta::new().with_attr(attr::CURRENT_POSITION, *position),
                )
            }
            _ => return Err(self.unsupported()),
        };
        Ok(Plan {
            calls: vec![call],
            optimistic,
        })
    }

    // ── Climate ──────────────────────────────────────────────────────

    fn target_temperature(&self, celsius: f64) -> Result<i64, CoreError> {
        let (min, max) = temperature_range(self.entity.family).ok_or_else(|| self.unsupported())?;
        if !celsius.is_finite() || celsius < min || celsius > max {
            return Err(CoreError::ValidationFailed {
                message: format!("target {celsius}°C outside {min}–{max}°C"),
            });
        }
        Ok(encode_tenths(celsius))
    }

    fn is_off(&self) -> bool {
        matches!(
            self.entity.state,
            EntityState::Hvac(HvacMode::Off) | EntityState::Unknown
        )
    }

    fn vrv(&self) -> Result<Plan, CoreError> {
        let (calls, optimistic) = match self.command {
            Command::TurnOn { .. } => (
                vec![self.power("O", true)],
                StateDelta::state(EntityState::Hvac(last_mode(self.entity))),
            ),
            Command::TurnOff { .. } | Command::SetHvacMode { mode: HvacMode::Off, .. } => (
                vec![self.power("O", false)],
                StateDelta::state(EntityState::Hvac(HvacMode::Off)),
            ),
            Command::SetHvacMode { mode, .. } => {
                let index = VRV_MODES
                    .iter()
                    .position(|m| m == mode)
                    .and_then(|i| i64::try_from(i).ok())
                    .ok_or_else(|| self.unsupported())?;
                let mut calls = Vec::with_capacity(2);
                if self.is_off() {
                    calls.push(self.power("O", true));
                }
                calls.push(self.io("MODE", TYPE_ENUM, index));
                (calls, mode_delta(*mode))
            }
            Command::SetTargetTemperature { celsius, .. } => (
                vec![self.io("tT", TYPE_TEMPERATURE, self.target_temperature(*celsius)?)],
                StateDelta::new().with_attr(attr::TARGET_TEMPERATURE, *celsius),
            ),
            Command::SetFanMode { fan, .. } => (
                vec![self.io("F", TYPE_ENUM, fan_level(*fan))],
                StateDelta::new().with_attr(attr::FAN_MODE, fan.as_ref()),
            ),
            _ => return Err(self.unsupported()),
        };
        Ok(Plan { calls, optimistic })
    }

    fn thermostat(&self) -> Result<Plan, CoreError> {
        let (calls, optimistic) = match self.command {
            Command::TurnOn { .. } | Command::SetHvacMode { mode: HvacMode::Heat, .. } => (
                vec![self.power("P1", true)],
                StateDelta::state(EntityState::Hvac(HvacMode::Heat)),
            ),
            Command::TurnOff { .. } | Command::SetHvacMode { mode: HvacMode::Off, .. } => (
                vec![self.power("P1", false), self.power("P2", false)],
                StateDelta::state(EntityState::Hvac(HvacMode::Off)).with_attr(attr::HEATING, false),
            ),
            Command::SetTargetTemperature { celsius, .. } => (
                vec![self.io("P3", TYPE_TEMPERATURE, self.target_temperature(*celsius)?)],
                StateDelta::new().with_attr(attr::TARGET_TEMPERATURE, *celsius),
            ),
            _ => return Err(self.unsupported()),
        };
        Ok(Plan { calls, optimistic })
    }

    fn air_board(&self) -> Result<Plan, CoreError> {
        let (calls, optimistic) = match self.command {
            Command::TurnOn { .. } => (
                vec![self.power("P1", true)],
                StateDelta::state(EntityState::Hvac(last_mode(self.entity))),
            ),
            Command::TurnOff { .. } | Command::SetHvacMode { mode: HvacMode::Off, .. } => (
                vec![self.power("P1", false)],
                StateDelta::state(EntityState::Hvac(HvacMode::Off)),
            ),
            Command::SetHvacMode { mode, .. } => {
                let code = air_board_mode_code(*mode).ok_or_else(|| self.unsupported())?;
                (
                    vec![self.power("P1", true), self.io("P2", TYPE_ENUM, code)],
                    mode_delta(*mode),
                )
            }
            Command::SetTargetTemperature { celsius, .. } => (
                vec![self.io("P3", TYPE_TEMPERATURE, self.target_temperature(*celsius)?)],
                StateDelta::new().with_attr(attr::TARGET_TEMPERATURE, *celsius),
            ),
            Command::SetFanMode { fan, .. } => (
                vec![self.io("P4", TYPE_ENUM, fan_level(*fan))],
                StateDelta::new().with_attr(attr::FAN_MODE, fan.as_ref()),
            ),
            _ => return Err(self.unsupported()),
        };
        Ok(Plan { calls, optimistic })
    }

    // ── Automations ──────────────────────────────────────────────────

    fn automation(&self) -> Result<Plan, CoreError> {
        match self.command {
            Command::TurnOn { .. } => Ok(Plan {
                calls: vec![ApiCall::Scene {
                    hub: self.entity.device.hub.clone(),
                    scene: self.entity.device.device.clone(),
                }],
                optimistic: StateDelta::state(EntityState::On),
            }),
            _ => Err(self.unsupported()),
        }
    }
}

fn mode_delta(mode: HvacMode) -> StateDelta {
    StateDelta::state(EntityState::Hvac(mode)).with_attr(attr::LAST_MODE, mode.as_ref())
}

fn rgb_json(rgb: Rgb) -> serde_json::Value {
    json!([rgb.r, rgb.g, rgb.b])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::Hs;
    use crate::identity::identity_for;
    use crate::model::{Attributes, DeviceInfo, EntityId, FanSpeed};
    use pretty_assertions::assert_eq;

    fn entity(devtype: &str, key: &str, state: EntityState) -> Entity {
        let rule = classify(devtype, key).unwrap();
        Entity {
            id: identity_for(rule, devtype, "HUB1", "d1", key),
            name: "test".into(),
            device: DeviceInfo {
                hub: "HUB1".into(),
                device: "d1".into(),
                devtype: devtype.into(),
                name: "test".into(),
                version: None,
            },
            family: rule.family,
            channel: rule.identity_key(key).map(str::to_owned),
            device_class: rule.class,
            state,
            attributes: Attributes::new(),
            last_updated: None,
        }
    }

    fn io(idx: &str, kind: u8, val: i64) -> ApiCall {
        ApiCall::Io(IoWrite {
            agt: "HUB1".into(),
            me: "d1".into(),
            idx: idx.into(),
            kind,
            val,
        })
    }

    fn plan(command: Command, entity: &Entity) -> Plan {
        encode(&command, Some(entity)).unwrap()
    }

    fn id(entity: &Entity) -> EntityId {
        entity.id.clone()
    }

    #[test]
    fn switch_on_off() {
        let e = entity("SL_SW_IF3", "L2", EntityState::Off);
        let p = plan(Command::TurnOn { entity: id(&e) }, &e);
        assert_eq!(p.calls, vec![io("L2", 0x81, 1)]);
        assert_eq!(p.optimistic.state, Some(EntityState::On));

        let p = plan(Command::TurnOff { entity: id(&e) }, &e);
        assert_eq!(p.calls, vec![io("L2", 0x80, 0)]);
    }

    #[test]
    fn plug_sensor_channels_are_read_only() {
        let e = entity("SL_OE_DE", "P3", EntityState::Number(5.0));
        assert!(matches!(
            encode(&Command::TurnOn { entity: id(&e) }, Some(&e)),
            Err(CoreError::Unsupported { .. })
        ));
    }

    #[test]
    fn light_colors() {
        let e = entity("SL_CT_RGBW", "RGBW", EntityState::Off);
        let p = plan(
            Command::SetRgbw {
                entity: id(&e),
                rgbw: Rgbw::new(1, 2, 3, 4),
            },
            &e,
        );
        assert_eq!(p.calls, vec![io("RGBW", 0xff, 0x04_01_02_03)]);

        let p = plan(
            Command::SetHs {
                entity: id(&e),
                hs: Hs { hue: 0.0, saturation: 100.0 },
            },
            &e,
        );
        assert_eq!(p.calls, vec![io("RGBW", 0xff, 0x00_FF_00_00)]);

        let spot = entity("SL_SPOT", "RGB", EntityState::On);
        let p = plan(
            Command::SetRgb {
                entity: id(&spot),
                rgb: Rgb::new(9, 8, 7),
            },
            &spot,
        );
        assert_eq!(p.calls, vec![io("RGB", 0xff, 0x00_09_08_07)]);
    }

    #[test]
    fn spot_turn_off_keeps_stored_color() {
        let mut spot = entity("SL_SPOT", "RGB", EntityState::On);
        spot.attributes.insert(attr::RGB_COLOR.to_owned(), json!([255, 0, 0]).into());

        let p = plan(Command::TurnOff { entity: id(&spot) }, &spot);
        assert_eq!(p.calls, vec![io("RGB", 0x80, 0)]);
        assert_eq!(p.optimistic.state, Some(EntityState::Off));
        assert!(p.optimistic.attributes.is_empty());
    }

    #[test]
    fn dimmer_writes_level_then_power() {
        let e = entity("SL_LI_WW", "P1", EntityState::Off);
        assert_eq!(e.channel.as_deref(), Some("P1P2"));

        let p = plan(
            Command::SetBrightness {
                entity: id(&e),
                brightness: 128,
            },
            &e,
        );
        assert_eq!(p.calls, vec![io("P1", 0xcf, 128), io("P1", 0x81, 1)]);

        let p = plan(Command::SetColorTemp { entity: id(&e), mireds: 370 }, &e);
        assert_eq!(p.calls, vec![io("P2", 0xcf, 0), io("P1", 0x81, 1)]);
    }

    #[test]
    fn cover_commands() {
        let e = entity("SL_DOOYA", "P1", EntityState::Unknown);
        assert_eq!(plan(Command::OpenCover { entity: id(&e) }, &e).calls, vec![io("P1", 0xcf, 100)]);
        assert_eq!(plan(Command::CloseCover { entity: id(&e) }, &e).calls, vec![io("P1", 0xcf, 0)]);
        assert_eq!(plan(Command::StopCover { entity: id(&e) }, &e).calls, vec![io("P1", 0xce, 0x80)]);
        assert!(
            encode(
                &Command::SetCoverPosition {
                    entity: id(&e),
                    position: 101
                },
                Some(&e)
            )
            .is_err()
        );
    }

    #[test]
    fn vrv_mode_powers_on_first_when_off() {
        let off = entity("V_AIR_P", "O", EntityState::Hvac(HvacMode::Off));
        let p = plan(
            Command::SetHvacMode {
                entity: id(&off),
                mode: HvacMode::Cool,
            },
            &off,
        );
        assert_eq!(p.calls, vec![io("O", 0x81, 1), io("MODE", 0xce, 3)]);

        let on = entity("V_AIR_P", "O", EntityState::Hvac(HvacMode::Auto));
        let p = plan(
            Command::SetHvacMode {
                entity: id(&on),
                mode: HvacMode::Heat,
            },
            &on,
        );
        assert_eq!(p.calls, vec![io("MODE", 0xce, 4)]);

        let p = plan(
            Command::SetTargetTemperature {
                entity: id(&on),
                celsius: 24.5,
            },
            &on,
        );
        assert_eq!(p.calls, vec![io("tT", 0x88, 245)]);

        let p = plan(
            Command::SetFanMode {
                entity: id(&on),
                fan: FanSpeed::High,
            },
            &on,
        );
        assert_eq!(p.calls, vec![io("F", 0xce, 75)]);
    }

    #[test]
    fn temperature_outside_range_is_rejected() {
        let e = entity("SL_UACCB", "P3", EntityState::Hvac(HvacMode::Cool));
        let err = encode(
            &Command::SetTargetTemperature {
                entity: id(&e),
                celsius: 31.0,
            },
            Some(&e),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
    }

    #[test]
    fn thermostat_off_clears_both_relays() {
        let e = entity("SL_CP_DN", "P1", EntityState::Hvac(HvacMode::Heat));
        let p = plan(Command::TurnOff { entity: id(&e) }, &e);
        assert_eq!(p.calls, vec![io("P1", 0x80, 0), io("P2", 0x80, 0)]);
        assert!(
            encode(
                &Command::SetHvacMode {
                    entity: id(&e),
                    mode: HvacMode::Cool
                },
                Some(&e)
            )
            .is_err()
        );
    }

    #[test]
    fn air_board_mode() {
        let e = entity("SL_UACCB", "P2", EntityState::Hvac(HvacMode::Off));
        let p = plan(
            Command::SetHvacMode {
                entity: id(&e),
                mode: HvacMode::Dry,
            },
            &e,
        );
        assert_eq!(p.calls, vec![io("P1", 0x81, 1), io("P2", 0xce, 5)]);
    }

    #[test]
    fn sensors_reject_commands() {
        let e = entity("SL_SC_THL", "T", EntityState::Number(20.0));
        assert!(matches!(
            encode(&Command::TurnOn { entity: id(&e) }, Some(&e)),
            Err(CoreError::Unsupported { .. })
        ));
    }

    #[test]
    fn service_commands_need_no_entity() {
        let p = encode(
            &Command::SetScene {
                hub: "HUB1".into(),
                scene: "7".into(),
            },
            None,
        )
        .unwrap();
        assert_eq!(
            p.calls,
            vec![ApiCall::Scene {
                hub: "HUB1".into(),
                scene: "7".into()
            }]
        );
        assert!(p.optimistic.is_empty());
    }
}
