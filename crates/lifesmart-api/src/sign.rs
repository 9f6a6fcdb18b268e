// Request signing
//
// Every signed call carries a `system` block whose `sign` field is the
// lowercase hex MD5 of a canonical string:
//
//   method:<M>,<k1>:<v1>,...,time:<t>,userid:<u>,usertoken:<ut>,appkey:<ak>,apptoken:<at>
//
// Parameters are emitted in key order. The same scheme authenticates the
// push channel with the `WbAuth` method and no parameters.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use md5::{Digest, Md5};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::auth::Credentials;
use crate::error::Error;

/// Request parameters. A `BTreeMap` keeps the canonical key order.
pub type Params = BTreeMap<String, serde_json::Value>;

const API_VERSION: &str = "1.0";
const API_LANG: &str = "en";

/// The `system` block attached to every signed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemBlock {
    pub ver: &'static str,
    pub lang: &'static str,
    pub userid: String,
    pub appkey: String,
    pub time: i64,
    pub sign: String,
}

/// A complete signed request body.
#[derive(Debug, Clone, Serialize)]
pub struct SignedRequest<'a> {
    pub id: u32,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<&'a Params>,
    pub system: SystemBlock,
}

/// Signs requests for one account.
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Canonical string for `method` with `params` at `time`.
    pub fn canonical(&self, method: &str, params: Option<&Params>, time: i64) -> Result<String, Error> {
        let user_token = self
            .credentials
            .user_token
            .as_ref()
            .ok_or(Error::MissingUserToken)?;

        let mut out = format!("method:{method},");
        for (key, value) in params.into_iter().flatten() {
            let _ = write!(out, "{key}:{},", canonical_value(value));
        }
        let _ = write!(
            out,
            "time:{time},userid:{},usertoken:{},appkey:{},apptoken:{}",
            self.credentials.user_id,
            user_token.expose_secret(),
            self.credentials.app_key,
            self.credentials.app_token.expose_secret(),
        );
        Ok(out)
    }

    /// Build the `system` block for `method`.
    pub fn system(&self, method: &str, params: Option<&Params>, time: i64) -> Result<SystemBlock, Error> {
        let canonical = self.canonical(method, params, time)?;
        Ok(SystemBlock {
            ver: API_VERSION,
            lang: API_LANG,
            userid: self.credentials.user_id.clone(),
            appkey: self.credentials.app_key.clone(),
            time,
            sign: digest(&canonical),
        })
    }

    /// Build a full signed request body.
    pub fn request<'a>(
        &self,
        id: u32,
        method: &'a str,
        params: Option<&'a Params>,
        time: i64,
    ) -> Result<SignedRequest<'a>, Error> {
        Ok(SignedRequest {
            id,
            method,
            params,
            system: self.system(method, params, time)?,
        })
    }

    /// The first frame sent on a freshly opened push channel.
    pub fn push_auth_frame(&self, time: i64) -> Result<String, Error> {
        let request = self.request(1, "WbAuth", None, time)?;
        serde_json::to_string(&request).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::new(),
        })
    }
}

/// Flatten a serializable struct into signing parameters.
pub fn params_from<T: Serialize>(value: &T) -> Result<Params, Error> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map.into_iter().collect()),
        Ok(other) => Err(Error::Deserialization {
            message: "request parameters must be a JSON object".into(),
            body: other.to_string(),
        }),
        Err(e) => Err(Error::Deserialization {
            message: e.to_string(),
            body: String::new(),
        }),
    }
}

/// Lowercase hex MD5 of `input`.
pub fn digest(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

fn canonical_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
