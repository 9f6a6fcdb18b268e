// Device endpoints: EpGetAll, EpGet, EpSet

use serde::Serialize;
use tracing::debug;

use crate::client::{ApiClient, DEFAULT_REQUEST_ID};
use crate::error::Error;
use crate::models::RawDevice;
use crate::sign::params_from;

/// One IO point write (`EpSet`).
///
/// `kind` is the vendor type code (`0x81` on, `0x80` off, `0xcf` level, ...).
/// It travels as a hex string, which is what the cloud signs and expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoWrite {
    pub agt: String,
    pub me: String,
    pub idx: String,
    pub kind: u8,
    pub val: i64,
}

#[derive(Serialize)]
struct EpSetParams<'a> {
    agt: &'a str,
    me: &'a str,
    idx: &'a str,
    #[serde(rename = "type")]
    kind: String,
    val: i64,
}

#[derive(Serialize)]
struct DeviceRef<'a> {
    agt: &'a str,
    me: &'a str,
}

impl IoWrite {
    /// Type code in the wire form, e.g. `0x81`.
    pub fn type_code(&self) -> String {
        format!("{:#04x}", self.kind)
    }
}

impl ApiClient {
    /// Every device visible to the account.
    pub async fn get_all_devices(&self) -> Result<Vec<RawDevice>, Error> {
        let devices: Vec<RawDevice> = self.call("api.EpGetAll", "EpGetAll", None).await?;
        debug!(count = devices.len(), "EpGetAll complete");
        Ok(devices)
    }

    /// Re-read one device, including all of its IO points.
    pub async fn get_device(&self, agt: &str, me: &str) -> Result<RawDevice, Error> {
        let params = params_from(&DeviceRef { agt, me })?;
        self.call("api.EpGet", "EpGet", Some(&params)).await
    }

    /// Write one IO point. Returns the vendor result code (0 = accepted).
    pub async fn set_io(&self, write: &IoWrite) -> Result<i64, Error> {
        let params = params_from(&EpSetParams {
            agt: &write.agt,
            me: &write.me,
            idx: &write.idx,
            kind: write.type_code(),
            val: write.val,
        })?;
        self.call_for_code("api.EpSet", "EpSet", &params, DEFAULT_REQUEST_ID)
            .await
    }
}
