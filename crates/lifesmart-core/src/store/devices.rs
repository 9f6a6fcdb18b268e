// ── Device records ──
//
// The raw inventory as the cloud reported it. Records are created at load
// time, patched in place by push updates, and never removed while the
// integration runs.

use dashmap::DashMap;
use lifesmart_api::{IoPoint, RawDevice};

/// Raw device records keyed by `(hub, device)`.
#[derive(Default)]
pub struct DeviceStore {
    devices: DashMap<(String, String), RawDevice>,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a device record.
    pub fn insert(&self, device: RawDevice) {
        self.devices.insert((device.agt.clone(), device.me.clone()), device);
    }

    pub fn get(&self, hub: &str, device: &str) -> Option<RawDevice> {
        self.devices
            .get(&(hub.to_owned(), device.to_owned()))
            .map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Patch one IO point with the fields present in `point`.
    ///
    /// Returns `false` if the device is not in the inventory.
    pub fn apply_point(&self, hub: &str, device: &str, idx: &str, point: &IoPoint) -> bool {
        let Some(mut record) = self.devices.get_mut(&(hub.to_owned(), device.to_owned())) else {
            return false;
        };
        let slot = record.data.entry(idx.to_owned()).or_default();
        if point.kind.is_some() {
            slot.kind = point.kind;
        }
        if point.val.is_some() {
            slot.val = point.val;
        }
        if point.v.is_some() {
            slot.v = point.v;
        }
        if point.ts.is_some() {
            slot.ts = point.ts;
        }
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn plug() -> RawDevice {
        let mut data = BTreeMap::new();
        data.insert(
            "P2".to_owned(),
            IoPoint {
                kind: Some(8),
                val: Some(12),
                v: Some(1.2),
                ts: None,
                name: Some("Energy".into()),
            },
        );
        RawDevice {
            agt: "HUB1".into(),
            me: "a1".into(),
            devtype: "SL_OE_DE".into(),
            name: "Desk".into(),
            ver: None,
            stat: Some(1),
            data,
        }
    }

    #[test]
    fn apply_point_merges_present_fields() {
        let store = DeviceStore::new();
        store.insert(plug());

        let patch = IoPoint {
            v: Some(230.5),
            ..IoPoint::default()
        };
        assert!(store.apply_point("HUB1", "a1", "P2", &patch));

        let point = &store.get("HUB1", "a1").unwrap().data["P2"];
        assert_eq!(point.v, Some(230.5));
        assert_eq!(point.val, Some(12));
        assert_eq!(point.name.as_deref(), Some("Energy"));
    }

    #[test]
    fn unknown_device_is_not_created() {
        let store = DeviceStore::new();
        assert!(!store.apply_point("HUB1", "zz", "P1", &IoPoint::default()));
        assert!(store.is_empty());
    }
}
