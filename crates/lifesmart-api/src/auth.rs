// Endpoints, credentials, and the user-token bootstrap
//
// Every data call is signed with the app key/token pair plus a user
// token. The user token comes either from configuration or from the
// two-step `auth.login` → `auth.do_auth` exchange implemented here.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::Error;

const VENDOR_DOMAIN: &str = "ilifesmart.com";
const PUSH_PORT: u16 = 8443;

// ── Endpoint ─────────────────────────────────────────────────────────

/// Regional REST and push endpoints.
///
/// An empty region selects the global cluster (`api.ilifesmart.com`);
/// anything else is inserted as a subdomain (`api.us.ilifesmart.com`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    region: String,
    api_base: Url,
    push_url: Url,
}

impl Endpoint {
    /// Build the endpoint pair for a vendor region (`""`, `cn`, `us`, `eu`, `sg`, ...).
    pub fn for_region(region: &str) -> Result<Self, Error> {
        let region = region.trim().to_ascii_lowercase();
        let host = if region.is_empty() {
            format!("api.{VENDOR_DOMAIN}")
        } else {
            format!("api.{region}.{VENDOR_DOMAIN}")
        };

        Ok(Self {
            api_base: Url::parse(&format!("https://{host}/app/"))?,
            push_url: Url::parse(&format!("wss://{host}:{PUSH_PORT}/wsapp/"))?,
            region,
        })
    }

    /// Replace the REST base (tests, private deployments).
    ///
    /// A trailing slash is appended when missing so method paths join
    /// underneath it rather than replacing the last segment.
    pub fn with_api_base(mut self, base: &str) -> Result<Self, Error> {
        let normalized = if base.ends_with('/') {
            base.to_owned()
        } else {
            format!("{base}/")
        };
        self.api_base = Url::parse(&normalized)?;
        Ok(self)
    }

    /// Replace the push channel URL.
    pub fn with_push_url(mut self, url: &str) -> Result<Self, Error> {
        self.push_url = Url::parse(url)?;
        Ok(self)
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    pub fn push_url(&self) -> &Url {
        &self.push_url
    }

    /// Full URL for a REST method path such as `api.EpGetAll` or `irapi.SendKeys`.
    pub fn method_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.api_base.join(path)?)
    }
}

// ── Credentials ──────────────────────────────────────────────────────

/// Signing material for one vendor account.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub app_key: String,
    pub app_token: SecretString,
    pub user_id: String,
    pub user_token: Option<SecretString>,
}

impl Credentials {
    pub fn new(app_key: impl Into<String>, app_token: SecretString, user_id: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_token,
            user_id: user_id.into(),
            user_token: None,
        }
    }

    pub fn with_user_token(mut self, token: SecretString) -> Self {
        self.user_token = Some(token);
        self
    }

    /// Adopt the result of a login. The vendor may canonicalize the user id.
    pub fn with_session(mut self, session: Session) -> Self {
        self.user_id = session.user_id;
        self.user_token = Some(session.user_token);
        self
    }
}

/// Result of a successful `auth.login` → `auth.do_auth` exchange.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub user_token: SecretString,
}

// ── Login flow ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AuthResponse {
    code: serde_json::Value,
    #[serde(default)]
    userid: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    usertoken: Option<String>,
    #[serde(default)]
    message: Option<serde_json::Value>,
}

impl AuthResponse {
    fn ensure_success(self, step: &str) -> Result<Self, Error> {
        if self.code.as_str() == Some("success") {
            return Ok(self);
        }
        let detail = self
            .message
            .as_ref()
            .map_or_else(|| self.code.to_string(), ToString::to_string);
        Err(Error::Authentication {
            message: format!("{step} rejected: {detail}"),
        })
    }
}

/// Exchange a password for a user token.
///
/// Unsigned: `auth.login` yields a temporary token, which `auth.do_auth`
/// trades for the long-lived user token bound to `endpoint.region()`.
pub async fn login(
    http: &reqwest::Client,
    endpoint: &Endpoint,
    app_key: &str,
    user_id: &str,
    password: &SecretString,
) -> Result<Session, Error> {
    let url = endpoint.method_url("auth.login")?;
    debug!(%url, user_id, "requesting temporary token");

    let body = json!({
        "uid": user_id,
        "pwd": password.expose_secret(),
        "appkey": app_key,
    });
    let step_one = post_auth(http, url, &body).await?.ensure_success("auth.login")?;

    let (Some(canonical_id), Some(token)) = (step_one.userid, step_one.token) else {
        return Err(Error::Authentication {
            message: "auth.login response is missing userid or token".into(),
        });
    };

    let url = endpoint.method_url("auth.do_auth")?;
    let body = json!({
        "userid": canonical_id,
        "token": token,
        "appkey": app_key,
        "rgn": endpoint.region(),
    });
    let step_two = post_auth(http, url, &body).await?.ensure_success("auth.do_auth")?;

    let user_token = step_two.usertoken.ok_or_else(|| Error::Authentication {
        message: "auth.do_auth response is missing usertoken".into(),
    })?;

    debug!(user_id = %canonical_id, "user token negotiated");
    Ok(Session {
        user_id: canonical_id,
        user_token: SecretString::from(user_token),
    })
}

async fn post_auth(
    http: &reqwest::Client,
    url: Url,
    body: &serde_json::Value,
) -> Result<AuthResponse, Error> {
    let resp = http.post(url).json(body).send().await?;
    let text = resp.text().await?;
    serde_json::from_str(&text).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: text,
    })
}
