// LifeSmart REST client
//
// Wraps `reqwest::Client` with request signing and `{code, message}`
// envelope unwrapping. Endpoint families (devices, scenes, IR) are
// implemented as inherent methods in separate files to keep this module
// focused on transport mechanics.

use secrecy::SecretString;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::{self, Credentials, Endpoint};
use crate::error::Error;
use crate::sign::{Params, Signer};
use crate::transport::TransportConfig;

/// Request id used for ordinary calls.
pub(crate) const DEFAULT_REQUEST_ID: u32 = 1;

/// Signed HTTP client for one vendor account.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoint: Endpoint,
    signer: Signer,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    code: serde_json::Value,
    #[serde(default)]
    message: serde_json::Value,
}

impl ApiClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// The credentials must already carry a user token; see
    /// [`login`](Self::login) for the password flow.
    pub fn new(
        endpoint: Endpoint,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, endpoint, credentials))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, endpoint: Endpoint, credentials: Credentials) -> Self {
        Self {
            http,
            endpoint,
            signer: Signer::new(credentials),
        }
    }

    /// Negotiate a user token with `password`, then build the client.
    pub async fn login(
        endpoint: Endpoint,
        credentials: Credentials,
        password: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let session = auth::login(
            &http,
            &endpoint,
            &credentials.app_key,
            &credentials.user_id,
            password,
        )
        .await?;
        Ok(Self::with_client(http, endpoint, credentials.with_session(session)))
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Signed call whose `message` is the payload. Any non-zero code is an error.
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        method: &str,
        params: Option<&Params>,
    ) -> Result<T, Error> {
        let (envelope, body) = self.send(path, method, params, DEFAULT_REQUEST_ID).await?;
        let code = envelope_code(&envelope, &body)?;
        if code != 0 {
            return Err(Error::Vendor {
                code,
                message: message_text(&envelope.message),
            });
        }

        serde_json::from_value(envelope.message).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// Signed call where only the result code matters (writes).
    ///
    /// The code is returned as-is; callers decide what a non-zero code means.
    pub(crate) async fn call_for_code(
        &self,
        path: &str,
        method: &str,
        params: &Params,
        id: u32,
    ) -> Result<i64, Error> {
        let (envelope, body) = self.send(path, method, Some(params), id).await?;
        let code = envelope_code(&envelope, &body)?;
        if code != 0 {
            debug!(method, code, message = %message_text(&envelope.message), "vendor rejected write");
        }
        Ok(code)
    }

    async fn send(
        &self,
        path: &str,
        method: &str,
        params: Option<&Params>,
        id: u32,
    ) -> Result<(Envelope, String), Error> {
        let url = self.endpoint.method_url(path)?;
        let request = self
            .signer
            .request(id, method, params, chrono::Utc::now().timestamp())?;

        debug!(%url, method, "POST");

        let resp = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let body = resp.text().await?;

        let envelope = serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.clone(),
        })?;
        Ok((envelope, body))
    }
}

fn envelope_code(envelope: &Envelope, body: &str) -> Result<i64, Error> {
    envelope
        .code
        .as_i64()
        .or_else(|| envelope.code.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| Error::Deserialization {
            message: format!("missing or non-numeric result code: {}", envelope.code),
            body: body.to_owned(),
        })
}

fn message_text(message: &serde_json::Value) -> String {
    match message {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
