// ── Device classification table ──
//
// A single static table maps `(devtype, sub-channel key)` to the entity
// kind, device class and decode strategy for that channel. Families may
// share a device type as long as their key sets are disjoint, so every
// pair resolves to at most one `Rule`. Pairs with no rule are
// unsupported and ignored.

use serde::Serialize;

use crate::model::{DeviceClass, EntityKind};

// ── Families ─────────────────────────────────────────────────────────

/// Product family a rule belongs to. Command encoding dispatches on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Switch,
    SmartPlug,
    LightSwitch,
    Dimmer,
    Spot,
    Guard,
    Motion,
    Smoke,
    GenericController,
    Lock,
    Environment,
    Gas,
    ExtraReading,
    Cover,
    Vrv,
    Thermostat,
    AirBoard,
    Automation,
}

const SWITCH_TYPES: &[&str] = &[
    "OD_WE_OT1", "SL_MC_ND1", "SL_MC_ND2", "SL_MC_ND3", "SL_NATURE", "SL_OL", "SL_OL_3C", "SL_OL_DE",
    "SL_OL_UK", "SL_OL_UL", "SL_OL_W", "SL_P_SW", "SL_S", "SL_SF_IF1", "SL_SF_IF2", "SL_SF_IF3",
    "SL_SF_RC", "SL_SPWM", "SL_SW_CP1", "SL_SW_CP2", "SL_SW_CP3", "SL_SW_DM1", "SL_SW_FE1",
    "SL_SW_FE2", "SL_SW_IF1", "SL_SW_IF2", "SL_SW_IF3", "SL_SW_MJ1", "SL_SW_MJ2", "SL_SW_ND1",
    "SL_SW_ND2", "SL_SW_ND3", "SL_SW_NS1", "SL_SW_NS2", "SL_SW_NS3", "SL_SW_RC", "SL_SW_RC1",
    "SL_SW_RC2", "SL_SW_RC3", "V_IND_S",
];
const SMART_PLUG_TYPES: &[&str] = &["SL_OE_DE", "SL_OE_3C", "SL_OE_W"];
const LIGHT_SWITCH_TYPES: &[&str] = &["SL_OL_W", "SL_SW_IF1", "SL_SW_IF2", "SL_SW_IF3", "SL_CT_RGBW"];
const DIMMER_TYPES: &[&str] = &["SL_LI_WW"];
const SPOT_TYPES: &[&str] = &["MSL_IRCTL", "OD_WE_IRCTL", "SL_SPOT"];
const GUARD_TYPES: &[&str] = &["SL_SC_G", "SL_SC_BG"];
const MOTION_TYPES: &[&str] = &["SL_SC_MHW", "SL_SC_BM", "SL_SC_CM"];
const SMOKE_TYPES: &[&str] = &["SL_P_A"];
const GENERIC_CONTROLLER_TYPES: &[&str] = &["SL_P", "SL_JEMA"];
const LOCK_TYPES: &[&str] = &["SL_LK_LS", "SL_LK_GTM", "SL_LK_AG", "SL_LK_SG", "SL_LK_YL"];
const CLIMATE_SENSOR_TYPES: &[&str] = &["SL_SC_THL", "SL_SC_BE"];
const AIR_QUALITY_TYPES: &[&str] = &["SL_SC_CQ"];
const GAS_TYPES: &[&str] = &["SL_SC_WA", "SL_SC_CH", "SL_SC_CP", "ELIQ_EM"];
const EXTRA_READING_TYPES: &[&str] = &["SL_SC_MHW", "SL_SC_BM", "SL_SC_G", "SL_SC_BG"];
const COVER_TYPES: &[&str] = &["SL_DOOYA"];
const VRV_TYPES: &[&str] = &["V_AIR_P"];
const THERMOSTAT_TYPES: &[&str] = &["SL_CP_DN"];
const AIR_BOARD_TYPES: &[&str] = &["SL_UACCB"];

/// Device type reported for hub automations.
pub const AUTOMATION_TYPE: &str = "ai";
/// Sub-channel key that marks an automation event.
pub const AUTOMATION_KEY: &str = "s";

/// Identity key shared by the two channels of a tunable-white dimmer.
pub const DIMMER_IDENTITY_KEY: &str = "P1P2";

const DARK_BRIGHT_KEYS: &[&str] = &[
    "dark", "dark1", "dark2", "dark3", "bright", "bright1", "bright2", "bright3",
];

// ── Rules ────────────────────────────────────────────────────────────

/// How a channel's wire value becomes entity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Type parity.
    OnOff,
    /// Parity plus WRGB unpacked as (R, G, B, W).
    Rgbw,
    /// Parity plus WRGB with white dropped.
    Rgb,
    /// WRGB as RGB; zero means "no color".
    RgbOptional,
    /// WRGB through RGB into hue/saturation; zero means "no color".
    Hs,
    DimmerBrightness,
    DimmerColorTemp,
    /// Active while `val != 0`.
    ActiveNonZero,
    /// Active while `val == 0`.
    ActiveZero,
    LockEvent,
    LockAlarm,
    /// Engineering value `v`.
    Reading,
    /// Raw `val`; zero readings are not forwarded.
    RawReading,
    /// Battery percentage in `val`.
    BatteryLevel,
    CoverPosition,
    VrvPower,
    VrvMode,
    VrvFan,
    VrvTarget,
    VrvCurrent,
    ThermostatPower,
    ThermostatHeating,
    ThermostatTarget,
    ThermostatCurrent,
    AirBoardPower,
    AirBoardMode,
    AirBoardTarget,
    AirBoardFan,
    AirBoardCurrent,
    Automation,
}

/// Which key, if any, goes into the entity identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    /// One entity per sub-channel.
    SubChannel,
    /// Several channels feed one entity under a fixed key.
    Fixed(&'static str),
    /// One entity for the whole device.
    Device,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMatch {
    Exact(&'static [&'static str]),
    Any,
}

impl KeyMatch {
    fn matches(self, key: &str) -> bool {
        match self {
            Self::Exact(keys) => keys.contains(&key),
            Self::Any => true,
        }
    }
}

/// One row of the classification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub family: Family,
    pub types: &'static [&'static str],
    pub keys: KeyMatch,
    pub kind: EntityKind,
    pub class: Option<DeviceClass>,
    pub strategy: Strategy,
    pub identity: IdentityKey,
}

impl Rule {
    /// Identity key for a channel matched by this rule.
    pub fn identity_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        match self.identity {
            IdentityKey::SubChannel => Some(key),
            IdentityKey::Fixed(fixed) => Some(fixed),
            IdentityKey::Device => None,
        }
    }

    fn matches(&self, devtype: &str, key: &str) -> bool {
        self.types.contains(&devtype) && self.keys.matches(key)
    }
}

const fn rule(
    family: Family,
    types: &'static [&'static str],
    keys: KeyMatch,
    kind: EntityKind,
    class: Option<DeviceClass>,
    strategy: Strategy,
    identity: IdentityKey,
) -> Rule {
    Rule {
        family,
        types,
        keys,
        kind,
        class,
        strategy,
        identity,
    }
}

const fn keys(list: &'static [&'static str]) -> KeyMatch {
    KeyMatch::Exact(list)
}

use DeviceClass as C;
use EntityKind as K;
use IdentityKey::{Device, SubChannel};
use Strategy as S;

static RULES: &[Rule] = &[
    // Switches
    rule(Family::Switch, SWITCH_TYPES, keys(&["L1", "L2", "L3", "P1", "P2", "P3"]), K::Switch, None, S::OnOff, SubChannel),
    rule(Family::SmartPlug, SMART_PLUG_TYPES, keys(&["P1"]), K::Switch, None, S::OnOff, SubChannel),
    rule(Family::SmartPlug, SMART_PLUG_TYPES, keys(&["P2"]), K::Sensor, Some(C::Energy), S::Reading, SubChannel),
    rule(Family::SmartPlug, SMART_PLUG_TYPES, keys(&["P3"]), K::Sensor, Some(C::Power), S::Reading, SubChannel),
    // Lights
    rule(Family::LightSwitch, LIGHT_SWITCH_TYPES, keys(&["RGB", "RGBW"]), K::Light, None, S::Rgbw, SubChannel),
    rule(Family::LightSwitch, LIGHT_SWITCH_TYPES, keys(&["HS"]), K::Light, None, S::Hs, SubChannel),
    rule(Family::LightSwitch, LIGHT_SWITCH_TYPES, keys(&["RGB_O"]), K::Light, None, S::RgbOptional, SubChannel),
    rule(Family::LightSwitch, LIGHT_SWITCH_TYPES, keys(DARK_BRIGHT_KEYS), K::Light, None, S::OnOff, SubChannel),
    rule(Family::Dimmer, DIMMER_TYPES, keys(&["P1"]), K::Light, None, S::DimmerBrightness, IdentityKey::Fixed(DIMMER_IDENTITY_KEY)),
    rule(Family::Dimmer, DIMMER_TYPES, keys(&["P2"]), K::Light, None, S::DimmerColorTemp, IdentityKey::Fixed(DIMMER_IDENTITY_KEY)),
    rule(Family::Spot, SPOT_TYPES, keys(&["RGB"]), K::Light, None, S::Rgb, SubChannel),
    // Binary sensors
    rule(Family::Guard, GUARD_TYPES, keys(&["G"]), K::BinarySensor, Some(C::Door), S::ActiveZero, SubChannel),
    rule(Family::Guard, GUARD_TYPES, keys(&["AXS"]), K::BinarySensor, Some(C::Vibration), S::ActiveNonZero, SubChannel),
    rule(Family::Guard, GUARD_TYPES, keys(&["B"]), K::BinarySensor, None, S::ActiveNonZero, SubChannel),
    rule(Family::Motion, MOTION_TYPES, keys(&["M", "P1"]), K::BinarySensor, Some(C::Motion), S::ActiveNonZero, SubChannel),
    rule(Family::Smoke, SMOKE_TYPES, keys(&["P1"]), K::BinarySensor, Some(C::Smoke), S::ActiveNonZero, SubChannel),
    rule(Family::GenericController, GENERIC_CONTROLLER_TYPES, keys(&["P5", "P6", "P7"]), K::BinarySensor, Some(C::Lock), S::ActiveZero, SubChannel),
    rule(Family::Lock, LOCK_TYPES, keys(&["EVTLO"]), K::BinarySensor, Some(C::Lock), S::LockEvent, SubChannel),
    rule(Family::Lock, LOCK_TYPES, keys(&["ALM"]), K::BinarySensor, Some(C::Problem), S::LockAlarm, SubChannel),
    rule(Family::Lock, LOCK_TYPES, keys(&["BAT"]), K::Sensor, Some(C::Battery), S::BatteryLevel, SubChannel),
    // Sensors
    rule(Family::Environment, CLIMATE_SENSOR_TYPES, keys(&["T"]), K::Sensor, Some(C::Temperature), S::Reading, SubChannel),
    rule(Family::Environment, CLIMATE_SENSOR_TYPES, keys(&["H"]), K::Sensor, Some(C::Humidity), S::Reading, SubChannel),
    rule(Family::Environment, CLIMATE_SENSOR_TYPES, keys(&["Z"]), K::Sensor, Some(C::Illuminance), S::Reading, SubChannel),
    rule(Family::Environment, CLIMATE_SENSOR_TYPES, keys(&["V"]), K::Sensor, Some(C::Battery), S::Reading, SubChannel),
    rule(Family::Environment, AIR_QUALITY_TYPES, keys(&["P1"]), K::Sensor, Some(C::Temperature), S::Reading, SubChannel),
    rule(Family::Environment, AIR_QUALITY_TYPES, keys(&["P2"]), K::Sensor, Some(C::Humidity), S::Reading, SubChannel),
    rule(Family::Environment, AIR_QUALITY_TYPES, keys(&["P3"]), K::Sensor, Some(C::CarbonDioxide), S::Reading, SubChannel),
    rule(Family::Environment, AIR_QUALITY_TYPES, keys(&["P4"]), K::Sensor, Some(C::VolatileOrganicCompounds), S::Reading, SubChannel),
    rule(Family::Environment, AIR_QUALITY_TYPES, keys(&["P5", "P6"]), K::Sensor, Some(C::Battery), S::Reading, SubChannel),
    rule(Family::Gas, GAS_TYPES, KeyMatch::Any, K::Sensor, None, S::RawReading, SubChannel),
    rule(Family::ExtraReading, EXTRA_READING_TYPES, keys(&["Z"]), K::Sensor, Some(C::Illuminance), S::Reading, SubChannel),
    rule(Family::ExtraReading, EXTRA_READING_TYPES, keys(&["V"]), K::Sensor, Some(C::Battery), S::Reading, SubChannel),
    rule(Family::ExtraReading, EXTRA_READING_TYPES, keys(&["P3", "P4"]), K::Sensor, None, S::Reading, SubChannel),
    // Covers
    rule(Family::Cover, COVER_TYPES, keys(&["P1"]), K::Cover, None, S::CoverPosition, Device),
    // Climate
    rule(Family::Vrv, VRV_TYPES, keys(&["O"]), K::Climate, None, S::VrvPower, Device),
    rule(Family::Vrv, VRV_TYPES, keys(&["MODE"]), K::Climate, None, S::VrvMode, Device),
    rule(Family::Vrv, VRV_TYPES, keys(&["F"]), K::Climate, None, S::VrvFan, Device),
    rule(Family::Vrv, VRV_TYPES, keys(&["tT"]), K::Climate, None, S::VrvTarget, Device),
    rule(Family::Vrv, VRV_TYPES, keys(&["T"]), K::Climate, None, S::VrvCurrent, Device),
    rule(Family::Thermostat, THERMOSTAT_TYPES, keys(&["P1"]), K::Climate, None, S::ThermostatPower, Device),
    rule(Family::Thermostat, THERMOSTAT_TYPES, keys(&["P2"]), K::Climate, None, S::ThermostatHeating, Device),
    rule(Family::Thermostat, THERMOSTAT_TYPES, keys(&["P3"]), K::Climate, None, S::ThermostatTarget, Device),
    rule(Family::Thermostat, THERMOSTAT_TYPES, keys(&["P4"]), K::Climate, None, S::ThermostatCurrent, Device),
    rule(Family::AirBoard, AIR_BOARD_TYPES, keys(&["P1"]), K::Climate, None, S::AirBoardPower, Device),
    rule(Family::AirBoard, AIR_BOARD_TYPES, keys(&["P2"]), K::Climate, None, S::AirBoardMode, Device),
    rule(Family::AirBoard, AIR_BOARD_TYPES, keys(&["P3"]), K::Climate, None, S::AirBoardTarget, Device),
    rule(Family::AirBoard, AIR_BOARD_TYPES, keys(&["P4"]), K::Climate, None, S::AirBoardFan, Device),
    rule(Family::AirBoard, AIR_BOARD_TYPES, keys(&["P6"]), K::Climate, None, S::AirBoardCurrent, Device),
];

/// Automations route through their own opt-in table; this rule never
/// takes part in [`classify`].
pub static AUTOMATION_RULE: Rule = rule(
    Family::Automation,
    &[AUTOMATION_TYPE],
    keys(&[AUTOMATION_KEY]),
    K::Switch,
    None,
    S::Automation,
    SubChannel,
);

/// Look up the rule for one channel of a device.
pub fn classify(devtype: &str, key: &str) -> Option<&'static Rule> {
    RULES.iter().find(|rule| rule.matches(devtype, key))
}

/// Every rule, in table order.
pub fn rules() -> &'static [Rule] {
    RULES
}

/// Whether any rule covers `devtype` at all.
pub fn is_supported_type(devtype: &str) -> bool {
    RULES.iter().any(|rule| rule.types.contains(&devtype))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn explicit_keys(rule: &Rule) -> &'static [&'static str] {
        match rule.keys {
            KeyMatch::Exact(keys) => keys,
            KeyMatch::Any => &["P1", "P2", "M", "T", "ANY"],
        }
    }

    #[test]
    fn no_pair_matches_two_rules() {
        for rule in rules() {
            for devtype in rule.types {
                for key in explicit_keys(rule) {
                    let hits = rules().iter().filter(|r| r.matches(devtype, key)).count();
                    assert_eq!(hits, 1, "{devtype}/{key} matches {hits} rules");
                }
            }
        }
    }

    #[test]
    fn shared_types_split_by_key() {
        assert_eq!(classify("SL_SW_IF3", "L2").unwrap().kind, EntityKind::Switch);
        assert_eq!(classify("SL_SW_IF3", "RGBW").unwrap().kind, EntityKind::Light);
        assert_eq!(classify("SL_LK_LS", "BAT").unwrap().kind, EntityKind::Sensor);
        assert_eq!(classify("SL_LK_LS", "EVTLO").unwrap().kind, EntityKind::BinarySensor);
        assert_eq!(classify("SL_OE_DE", "P1").unwrap().kind, EntityKind::Switch);
        assert_eq!(classify("SL_OE_DE", "P2").unwrap().kind, EntityKind::Sensor);
        assert_eq!(classify("SL_SC_G", "G").unwrap().class, Some(DeviceClass::Door));
        assert_eq!(classify("SL_SC_G", "V").unwrap().kind, EntityKind::Sensor);
    }

    #[test]
    fn unsupported_pairs_resolve_to_none() {
        assert!(classify("SL_SW_IF3", "P9").is_none());
        assert!(classify("NOT_A_DEVICE", "L1").is_none());
        assert!(!is_supported_type("NOT_A_DEVICE"));
        assert!(classify("SL_SC_MHW ", "M").is_none());
        assert!(classify(AUTOMATION_TYPE, AUTOMATION_KEY).is_none());
    }

    #[test]
    fn identity_keys() {
        let dimmer = classify("SL_LI_WW", "P2").unwrap();
        assert_eq!(dimmer.identity_key("P2"), Some("P1P2"));
        let vrv = classify("V_AIR_P", "tT").unwrap();
        assert_eq!(vrv.identity_key("tT"), None);
        let switch = classify("SL_S", "L1").unwrap();
        assert_eq!(switch.identity_key("L1"), Some("L1"));
    }

    #[test]
    fn gas_sensors_accept_any_key() {
        let rule = classify("SL_SC_CH", "P1").unwrap();
        assert_eq!(rule.strategy, Strategy::RawReading);
    }
}
