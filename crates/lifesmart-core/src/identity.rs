// ── Entity identity builder ──
//
// Folds (devtype, hub, device, key) into the canonical object id used as
// both the host unique id and the live-update routing key. Pure: the same
// tuple always yields the same token.

use crate::classify::Rule;
use crate::model::{EntityId, EntityKind};

/// Canonical object id, without the kind prefix.
pub fn object_id(devtype: &str, hub: &str, device: &str, key: Option<&str>) -> String {
    let mut parts = vec![normalize(devtype), normalize_hub(hub), normalize(device)];
    if let Some(key) = key {
        parts.push(normalize(key));
    }
    parts.join("_")
}

/// `<kind>.<object_id>` for an explicit entity kind.
pub fn build_identity(kind: EntityKind, devtype: &str, hub: &str, device: &str, key: Option<&str>) -> EntityId {
    EntityId::new(kind, object_id(devtype, hub, device, key))
}

/// Identity of the entity `rule` assigns to channel `key` of a device.
pub fn identity_for(rule: &Rule, devtype: &str, hub: &str, device: &str, key: &str) -> EntityId {
    build_identity(rule.kind, devtype, hub, device, rule.identity_key(key))
}

fn normalize(part: &str) -> String {
    part.chars()
        .map(|c| match c {
            ':' | '@' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

/// Hub ids additionally collapse runs of `_` and `-` into one `_`.
fn normalize_hub(hub: &str) -> String {
    let mut out = String::with_capacity(hub.len());
    let mut in_run = false;
    for c in normalize(hub).chars() {
        if c == '_' || c == '-' {
            if !in_run {
                out.push('_');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::classify::{KeyMatch, rules};

    #[test]
    fn canonical_tokens() {
        let id = build_identity(EntityKind::Switch, "SL_S", "HUB__1-2", "DEV1", Some("L1"));
        assert_eq!(id.to_string(), "switch.sl_s_hub_1_2_dev1_l1");

        let cover = build_identity(EntityKind::Cover, "SL_DOOYA", "HUB1", "CURTAIN", None);
        assert_eq!(cover.to_string(), "cover.sl_dooya_hub1_curtain");

        let dimmer = rules().iter().find(|r| r.types.contains(&"SL_LI_WW")).unwrap();
        let id = identity_for(dimmer, "SL_LI_WW", "HUB1", "LIGHT1", "P2");
        assert_eq!(id.to_string(), "light.sl_li_ww_hub1_light1_p1p2");
    }

    #[test]
    fn punctuation_is_normalized() {
        assert_eq!(
            object_id("SL_S", "A3EAAABtAEwQRzM0Njg5NA", "mac:00@11", Some("P1")),
            "sl_s_a3eaaabtaewqrzm0njg5na_mac_00_11_p1"
        );
    }

    #[test]
    fn deterministic() {
        let a = object_id("SL_SW_IF3", "Hub-1", "2d11", Some("L3"));
        let b = object_id("SL_SW_IF3", "Hub-1", "2d11", Some("L3"));
        assert_eq!(a, b);
    }

    #[test]
    fn injective_across_the_table() {
        let hubs = ["A3EAAABtAEwQRzM0Njg5NA", "HUB__1-2", "_agt_2"];
        let devices = ["2d11", "a1", "DEV_9"];
        let mut seen: HashMap<EntityId, (String, String, String, Option<String>)> = HashMap::new();

        for rule in rules() {
            let keys: &[&str] = match rule.keys {
                KeyMatch::Exact(keys) => keys,
                KeyMatch::Any => &["P1", "P2"],
            };
            for devtype in rule.types {
                for hub in hubs {
                    for device in devices {
                        for key in keys {
                            let id = identity_for(rule, devtype, hub, device, key);
                            let tuple = (
                                (*devtype).to_owned(),
                                hub.to_owned(),
                                device.to_owned(),
                                rule.identity_key(key).map(str::to_owned),
                            );
                            if let Some(previous) = seen.insert(id.clone(), tuple.clone()) {
                                assert_eq!(previous, tuple, "{id} produced by two tuples");
                            }
                        }
                    }
                }
            }
        }
    }
}
