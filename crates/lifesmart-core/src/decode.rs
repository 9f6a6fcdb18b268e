// ── Channel decoding ──
//
// Turns one IO point into a `StateDelta` for the entity that owns the
// channel. A missing field yields no write for the attribute it feeds,
// so previously known values survive partial frames.

use chrono::{DateTime, Utc};
use lifesmart_api::IoPoint;
use serde_json::json;

use crate::classify::{Family, Rule, Strategy};
use crate::codec::{
    self, ColorTempRange, DecodeError, decode_cover, decode_lock_event, decode_tenths, fan_speed_from_level,
    is_on, packed_word,
};
use crate::model::{Entity, EntityState, HvacMode, StateDelta};

/// Attribute names written by the decoders.
pub mod attr {
    pub const BRIGHTNESS: &str = "brightness";
    pub const COLOR_TEMP: &str = "color_temp";
    pub const MIN_MIREDS: &str = "min_mireds";
    pub const MAX_MIREDS: &str = "max_mireds";
    pub const RGB_COLOR: &str = "rgb_color";
    pub const RGBW_COLOR: &str = "rgbw_color";
    pub const HS_COLOR: &str = "hs_color";
    pub const REMOTES: &str = "remotes";

    pub const CURRENT_TEMPERATURE: &str = "current_temperature";
    pub const TARGET_TEMPERATURE: &str = "target_temperature";
    pub const MIN_TEMP: &str = "min_temp";
    pub const MAX_TEMP: &str = "max_temp";
    pub const FAN_MODE: &str = "fan_mode";
    pub const LAST_MODE: &str = "last_mode";
    pub const HEATING: &str = "heating";

    pub const CURRENT_POSITION: &str = "current_position";

    pub const UNLOCKING_METHOD: &str = "unlocking_method";
    pub const UNLOCKING_USER: &str = "unlocking_user";
    pub const UNLOCKING_SUCCESS: &str = "unlocking_success";
    pub const LAST_TIME: &str = "last_time";
    pub const RAW: &str = "raw";

    pub const UNIT: &str = "unit_of_measurement";
}

/// `MODE` index → mode for VRV units.
pub const VRV_MODES: [HvacMode; 6] = [
    HvacMode::Off,
    HvacMode::Auto,
    HvacMode::FanOnly,
    HvacMode::Cool,
    HvacMode::Heat,
    HvacMode::Dry,
];

/// Air board `P2` code → mode. Unknown codes fall back to auto.
pub fn air_board_mode(code: i64) -> HvacMode {
    match code {
        2 => HvacMode::FanOnly,
        3 => HvacMode::Cool,
        4 => HvacMode::Heat,
        5 => HvacMode::Dry,
        _ => HvacMode::Auto,
    }
}

pub fn air_board_mode_code(mode: HvacMode) -> Option<i64> {
    match mode {
        HvacMode::Auto => Some(1),
        HvacMode::FanOnly => Some(2),
        HvacMode::Cool => Some(3),
        HvacMode::Heat => Some(4),
        HvacMode::Dry => Some(5),
        HvacMode::Off => None,
    }
}

/// Supported target range in °C for a climate family.
pub fn temperature_range(family: Family) -> Option<(f64, f64)> {
    match family {
        Family::Vrv => Some((10.0, 35.0)),
        Family::Thermostat => Some((5.0, 35.0)),
        Family::AirBoard => Some((16.0, 30.0)),
        _ => None,
    }
}

/// Decode one channel reading against the entity's current state.
pub fn decode(rule: &Rule, point: &IoPoint, current: &Entity) -> Result<StateDelta, DecodeError> {
    let mut delta = StateDelta::new();
    let kind = point.kind;
    let val = point.val;

    match rule.strategy {
        Strategy::OnOff => set_parity(&mut delta, kind),
        Strategy::Rgbw => {
            set_parity(&mut delta, kind);
            if let Some(val) = val {
                let c = codec::unpack_rgbw(packed_word(val)?);
                delta.set_attr(attr::RGBW_COLOR, json!([c.r, c.g, c.b, c.w]));
            }
        }
        Strategy::Rgb => {
            set_parity(&mut delta, kind);
            if let Some(val) = val {
                let c = codec::unpack_rgb(packed_word(val)?);
                delta.set_attr(attr::RGB_COLOR, json!([c.r, c.g, c.b]));
            }
        }
        Strategy::RgbOptional => {
            set_parity(&mut delta, kind);
            match val {
                Some(0) => delta.set_attr(attr::RGB_COLOR, serde_json::Value::Null),
                Some(val) => {
                    let c = codec::unpack_rgb(packed_word(val)?);
                    delta.set_attr(attr::RGB_COLOR, json!([c.r, c.g, c.b]));
                }
                None => {}
            }
        }
        Strategy::Hs => {
            set_parity(&mut delta, kind);
            match val {
                Some(0) => delta.set_attr(attr::HS_COLOR, serde_json::Value::Null),
                Some(val) => {
                    let hs = codec::rgb_to_hs(codec::unpack_rgb(packed_word(val)?));
                    delta.set_attr(attr::HS_COLOR, json!([hs.hue, hs.saturation]));
                }
                None => {}
            }
        }
        Strategy::DimmerBrightness => {
            set_parity(&mut delta, kind);
            if let Some(val) = val {
                delta.set_attr(attr::BRIGHTNESS, codec::level(val)?);
            }
        }
        Strategy::DimmerColorTemp => {
            if let Some(val) = val {
                let mireds = codec::color_temp_from_level(codec::level(val)?, ColorTempRange::WARM_WHITE_DIMMER);
                delta.set_attr(attr::COLOR_TEMP, mireds);
            }
        }
        Strategy::ActiveNonZero => {
            if let Some(val) = val {
                delta.state = Some(EntityState::from_bool(val != 0));
            }
        }
        Strategy::ActiveZero => {
            if let Some(val) = val {
                delta.state = Some(EntityState::from_bool(val == 0));
            }
        }
        Strategy::LockEvent => {
            if let (Some(val), Some(kind)) = (val, kind) {
                let event = decode_lock_event(val, kind)?;
                delta.state = Some(EntityState::from_bool(event.unlocked));
                delta.set_attr(attr::UNLOCKING_METHOD, event.method.as_ref());
                delta.set_attr(attr::UNLOCKING_USER, event.user);
                delta.set_attr(attr::UNLOCKING_SUCCESS, event.success);
                if let Some(at) = point.ts.and_then(DateTime::<Utc>::from_timestamp_millis) {
                    delta.set_attr(attr::LAST_TIME, at.to_rfc3339());
                }
            }
        }
        Strategy::LockAlarm => {
            if let Some(val) = val {
                delta.state = Some(EntityState::from_bool(val > 0));
                delta.set_attr(attr::RAW, val);
            }
        }
        Strategy::Reading => {
            if let Some(v) = point.v {
                delta.state = Some(EntityState::Number(v));
            }
        }
        Strategy::RawReading => {
            if let Some(val) = val.filter(|v| *v != 0) {
                delta.state = Some(EntityState::Number(as_f64(val)));
            }
        }
        Strategy::BatteryLevel => {
            if let Some(val) = val {
                delta.state = Some(EntityState::Number(as_f64(val)));
            }
        }
        Strategy::CoverPosition => {
            if let Some(val) = val {
                let (position, motion) = decode_cover(val, kind.unwrap_or_default());
                delta.state = Some(EntityState::Cover(motion));
                delta.set_attr(attr::CURRENT_POSITION, position);
            }
        }
        Strategy::VrvPower | Strategy::AirBoardPower => {
            if let Some(kind) = kind {
                let mode = if is_on(kind) { last_mode(current) } else { HvacMode::Off };
                delta.state = Some(EntityState::Hvac(mode));
            }
        }
        Strategy::VrvMode => {
            if let Some(val) = val {
                let mode = usize::try_from(val)
                    .ok()
                    .and_then(|i| VRV_MODES.get(i).copied())
                    .ok_or(DecodeError::UnknownCode { field: "MODE", value: val })?;
                set_mode(&mut delta, current, mode);
            }
        }
        Strategy::AirBoardMode => {
            if let Some(val) = val {
                set_mode(&mut delta, current, air_board_mode(val));
            }
        }
        Strategy::VrvFan | Strategy::AirBoardFan => {
            if let Some(val) = val {
                delta.set_attr(attr::FAN_MODE, fan_speed_from_level(val).as_ref());
            }
        }
        Strategy::VrvTarget => {
            if let Some(v) = point.v {
                delta.set_attr(attr::TARGET_TEMPERATURE, v);
            }
        }
        Strategy::VrvCurrent => {
            if let Some(v) = point.v {
                delta.set_attr(attr::CURRENT_TEMPERATURE, v);
            }
        }
        Strategy::ThermostatPower => {
            if let Some(kind) = kind {
                let mode = if is_on(kind) { HvacMode::Heat } else { HvacMode::Off };
                delta.state = Some(EntityState::Hvac(mode));
            }
        }
        Strategy::ThermostatHeating => {
            if let Some(kind) = kind {
                delta.set_attr(attr::HEATING, is_on(kind));
            }
        }
        Strategy::ThermostatTarget | Strategy::AirBoardTarget => {
            if let Some(val) = val {
                delta.set_attr(attr::TARGET_TEMPERATURE, decode_tenths(val));
            }
        }
        Strategy::ThermostatCurrent | Strategy::AirBoardCurrent => {
            if let Some(val) = val {
                delta.set_attr(attr::CURRENT_TEMPERATURE, decode_tenths(val));
            }
        }
        Strategy::Automation => {}
    }

    Ok(delta)
}

/// Automation run status: 3 running, 4 stopped.
pub fn decode_automation(stat: Option<i64>) -> StateDelta {
    match stat {
        Some(3) => StateDelta::state(EntityState::On),
        Some(4) => StateDelta::state(EntityState::Off),
        _ => StateDelta::new(),
    }
}

/// Mode the unit returns to when powered on.
pub fn last_mode(entity: &Entity) -> HvacMode {
    entity
        .attribute(attr::LAST_MODE)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .filter(|mode| *mode != HvacMode::Off)
        .unwrap_or(HvacMode::Auto)
}

fn set_parity(delta: &mut StateDelta, kind: Option<i64>) {
    if let Some(kind) = kind {
        delta.state = Some(EntityState::from_bool(is_on(kind)));
    }
}

/// A mode report updates the remembered mode; the displayed state only
/// follows it while the unit is powered.
fn set_mode(delta: &mut StateDelta, current: &Entity, mode: HvacMode) {
    delta.set_attr(attr::LAST_MODE, mode.as_ref());
    if current.state != EntityState::Hvac(HvacMode::Off) {
        delta.state = Some(EntityState::Hvac(mode));
    }
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn as_f64(val: i64) -> f64 {
    val as f64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::model::{AttributeValue, Attributes, DeviceInfo, EntityId, EntityKind};
    use pretty_assertions::assert_eq;

    fn entity(devtype: &str, key: Option<&str>, state: EntityState) -> Entity {
        Entity {
            id: EntityId::new(EntityKind::Sensor, "test"),
            name: "test".into(),
            device: DeviceInfo {
                hub: "HUB1".into(),
                device: "d1".into(),
                devtype: devtype.into(),
                name: "test".into(),
                version: None,
            },
            family: Family::Switch,
            channel: key.map(str::to_owned),
            device_class: None,
            state,
            attributes: Attributes::new(),
            last_updated: None,
        }
    }

    fn point(kind: Option<i64>, val: Option<i64>, v: Option<f64>) -> IoPoint {
        IoPoint {
            kind,
            val,
            v,
            ..IoPoint::default()
        }
    }

    fn run(devtype: &str, key: &str, p: &IoPoint, current: &Entity) -> StateDelta {
        decode(classify(devtype, key).unwrap(), p, current).unwrap()
    }

    #[test]
    fn smart_plug_switch_and_power() {
        let e = entity("SL_OE_DE", Some("P1"), EntityState::Unknown);
        let d = run("SL_OE_DE", "P1", &point(Some(9), Some(0), None), &e);
        assert_eq!(d.state, Some(EntityState::On));

        let d = run("SL_OE_DE", "P2", &point(None, None, Some(230.5)), &e);
        assert_eq!(d.state, Some(EntityState::Number(230.5)));
        assert!(d.attributes.is_empty());
    }

    #[test]
    fn missing_fields_write_nothing() {
        let e = entity("SL_SW_IF3", Some("RGBW"), EntityState::On);
        let d = run("SL_SW_IF3", "RGBW", &IoPoint::default(), &e);
        assert!(d.is_empty());
    }

    #[test]
    fn light_switch_colors() {
        let e = entity("SL_SW_IF3", Some("RGBW"), EntityState::Unknown);
        let d = run("SL_SW_IF3", "RGBW", &point(Some(0x81), Some(0x0A_FF_00_80), None), &e);
        assert_eq!(d.state, Some(EntityState::On));
        assert_eq!(d.attributes[attr::RGBW_COLOR], AttributeValue::Json(json!([255, 0, 128, 10])));

        let d = run("SL_CT_RGBW", "RGB_O", &point(Some(0x80), Some(0), None), &e);
        assert_eq!(d.attributes[attr::RGB_COLOR], AttributeValue::Json(serde_json::Value::Null));

        let d = run("SL_CT_RGBW", "HS", &point(Some(0x81), Some(0x00_00_00_FF), None), &e);
        assert_eq!(d.attributes[attr::HS_COLOR], AttributeValue::Json(json!([240.0, 100.0])));
    }

    #[test]
    fn spot_drops_white() {
        let e = entity("SL_SPOT", Some("RGB"), EntityState::Unknown);
        let d = run("SL_SPOT", "RGB", &point(Some(0x81), Some(0x7F_01_02_03), None), &e);
        assert_eq!(d.attributes[attr::RGB_COLOR], AttributeValue::Json(json!([1, 2, 3])));
    }

    #[test]
    fn dimmer_channels() {
        let e = entity("SL_LI_WW", Some("P1P2"), EntityState::Unknown);
        let d = run("SL_LI_WW", "P1", &point(Some(0x81), Some(200), None), &e);
        assert_eq!(d.state, Some(EntityState::On));
        assert_eq!(d.attributes[attr::BRIGHTNESS], AttributeValue::Int(200));

        let d = run("SL_LI_WW", "P2", &point(Some(0x80), Some(0), None), &e);
        assert_eq!(d.state, None);
        assert_eq!(d.attributes[attr::COLOR_TEMP], AttributeValue::Int(370));

        let bad = decode(classify("SL_LI_WW", "P1").unwrap(), &point(Some(1), Some(999), None), &e);
        assert!(bad.is_err());
    }

    #[test]
    fn binary_sensor_polarity() {
        let e = entity("SL_SC_G", Some("G"), EntityState::Unknown);
        assert_eq!(run("SL_SC_G", "G", &point(None, Some(0), None), &e).state, Some(EntityState::On));
        assert_eq!(run("SL_SC_G", "G", &point(None, Some(1), None), &e).state, Some(EntityState::Off));
        assert_eq!(run("SL_SC_G", "AXS", &point(None, Some(2), None), &e).state, Some(EntityState::On));
        assert_eq!(run("SL_P", "P6", &point(None, Some(0), None), &e).state, Some(EntityState::On));
    }

    #[test]
    fn lock_event_attributes() {
        let e = entity("SL_LK_LS", Some("EVTLO"), EntityState::Unknown);
        let mut p = point(Some(1), Some((2 << 12) | 7), None);
        p.ts = Some(1_700_000_000_000);
        let d = run("SL_LK_LS", "EVTLO", &p, &e);

        assert_eq!(d.state, Some(EntityState::On));
        assert_eq!(d.attributes[attr::UNLOCKING_METHOD], AttributeValue::String("Fingerprint".into()));
        assert_eq!(d.attributes[attr::UNLOCKING_USER], AttributeValue::Int(7));
        assert_eq!(d.attributes[attr::UNLOCKING_SUCCESS], AttributeValue::Bool(true));
        assert_eq!(
            d.attributes[attr::LAST_TIME],
            AttributeValue::String("2023-11-14T22:13:20+00:00".into())
        );

        let alarm = run("SL_LK_LS", "ALM", &point(None, Some(2), None), &e);
        assert_eq!(alarm.state, Some(EntityState::On));
    }

    #[test]
    fn gas_zero_reading_is_not_forwarded() {
        let e = entity("SL_SC_CH", Some("P1"), EntityState::Number(12.0));
        assert!(run("SL_SC_CH", "P1", &point(None, Some(0), None), &e).is_empty());
        assert_eq!(
            run("SL_SC_CH", "P1", &point(None, Some(30), None), &e).state,
            Some(EntityState::Number(30.0))
        );
    }

    #[test]
    fn vrv_mode_follows_power() {
        let off = entity("V_AIR_P", None, EntityState::Hvac(HvacMode::Off));
        let d = run("V_AIR_P", "MODE", &point(None, Some(3), None), &off);
        assert_eq!(d.state, None);
        assert_eq!(d.attributes[attr::LAST_MODE], AttributeValue::String("cool".into()));

        let mut on = entity("V_AIR_P", None, EntityState::Hvac(HvacMode::Auto));
        let d = run("V_AIR_P", "MODE", &point(None, Some(4), None), &on);
        assert_eq!(d.state, Some(EntityState::Hvac(HvacMode::Heat)));

        on.attributes.insert(attr::LAST_MODE.into(), "dry".into());
        let d = run("V_AIR_P", "O", &point(Some(0x81), Some(1), None), &on);
        assert_eq!(d.state, Some(EntityState::Hvac(HvacMode::Dry)));

        let bad = decode(classify("V_AIR_P", "MODE").unwrap(), &point(None, Some(17), None), &on);
        assert!(bad.is_err());
    }

    #[test]
    fn thermostat_and_air_board_fixed_point() {
        let e = entity("SL_CP_DN", None, EntityState::Unknown);
        let d = run("SL_CP_DN", "P3", &point(None, Some(245), None), &e);
        assert_eq!(d.attributes[attr::TARGET_TEMPERATURE], AttributeValue::Float(24.5));
        let d = run("SL_CP_DN", "P2", &point(Some(0x81), None, None), &e);
        assert_eq!(d.attributes[attr::HEATING], AttributeValue::Bool(true));

        let d = run("SL_UACCB", "P6", &point(None, Some(218), None), &e);
        assert_eq!(d.attributes[attr::CURRENT_TEMPERATURE], AttributeValue::Float(21.8));
        let d = run("SL_UACCB", "P4", &point(None, Some(64), None), &e);
        assert_eq!(d.attributes[attr::FAN_MODE], AttributeValue::String("medium".into()));
        let d = run("SL_UACCB", "P2", &point(None, Some(3), None), &e);
        assert_eq!(d.state, Some(EntityState::Hvac(HvacMode::Cool)));
    }

    #[test]
    fn cover_channel() {
        let e = entity("SL_DOOYA", None, EntityState::Unknown);
        let d = run("SL_DOOYA", "P1", &point(Some(0x81), Some(0x80 | 60), None), &e);
        assert_eq!(d.state, Some(EntityState::Cover(crate::model::CoverMotion::Opening)));
        assert_eq!(d.attributes[attr::CURRENT_POSITION], AttributeValue::Int(60));
    }

    #[test]
    fn automation_status() {
        assert_eq!(decode_automation(Some(3)).state, Some(EntityState::On));
        assert_eq!(decode_automation(Some(4)).state, Some(EntityState::Off));
        assert!(decode_automation(Some(1)).is_empty());
        assert!(decode_automation(None).is_empty());
    }
}
