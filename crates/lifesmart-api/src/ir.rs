// Infrared endpoints: SendKeys, SendCodes, SendACKeys, GetRemoteList, GetRemote

use serde::{Deserialize, Serialize};

use crate::client::{ApiClient, DEFAULT_REQUEST_ID};
use crate::error::Error;
use crate::sign::params_from;

/// Press one or more keys of a learned or catalogue remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IrKeys {
    pub agt: String,
    pub me: String,
    pub category: String,
    pub brand: String,
    pub ai: String,
    /// JSON-encoded key list, passed through verbatim.
    pub keys: String,
}

/// Send raw IR codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IrCodes {
    pub agt: String,
    pub me: String,
    pub keys: String,
}

/// Full air-conditioner state for an IR AC remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcKeys {
    pub agt: String,
    pub me: String,
    pub category: String,
    pub brand: String,
    pub ai: String,
    pub key: String,
    pub power: i64,
    pub mode: i64,
    pub temp: i64,
    pub wind: i64,
    pub swing: i64,
}

#[derive(Serialize)]
struct RemoteRef<'a> {
    agt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ai: Option<&'a str>,
    #[serde(rename = "needKeys", skip_serializing_if = "Option::is_none")]
    need_keys: Option<u8>,
}

#[derive(Deserialize)]
struct RemoteDetail {
    #[serde(default)]
    codes: serde_json::Value,
}

impl ApiClient {
    pub async fn send_ir_keys(&self, keys: &IrKeys) -> Result<i64, Error> {
        self.call_for_code("irapi.SendKeys", "SendKeys", &params_from(keys)?, DEFAULT_REQUEST_ID)
            .await
    }

    pub async fn send_ir_codes(&self, codes: &IrCodes) -> Result<i64, Error> {
        self.call_for_code("irapi.SendCodes", "SendCodes", &params_from(codes)?, DEFAULT_REQUEST_ID)
            .await
    }

    pub async fn send_ac_keys(&self, keys: &AcKeys) -> Result<i64, Error> {
        self.call_for_code("irapi.SendACKeys", "SendACKeys", &params_from(keys)?, DEFAULT_REQUEST_ID)
            .await
    }

    /// Remotes configured on hub `agt`, keyed by remote id (`ai`).
    pub async fn get_remote_list(&self, agt: &str) -> Result<serde_json::Value, Error> {
        let params = params_from(&RemoteRef {
            agt,
            ai: None,
            need_keys: None,
        })?;
        self.call("irapi.GetRemoteList", "GetRemoteList", Some(&params))
            .await
    }

    /// Key codes of remote `ai` on hub `agt`.
    pub async fn get_remote(&self, agt: &str, ai: &str) -> Result<serde_json::Value, Error> {
        let params = params_from(&RemoteRef {
            agt,
            ai: Some(ai),
            need_keys: Some(2),
        })?;
        let detail: RemoteDetail = self
            .call("irapi.GetRemote", "GetRemote", Some(&params))
            .await?;
        Ok(detail.codes)
    }
}
