// ── Runtime integration configuration ──
//
// These types describe *how* to reach one LifeSmart account and which
// devices to expose. They carry credential data and tuning, but never
// touch disk. `lifesmart-config` (or the host) builds an
// `IntegrationConfig` and hands it in.

use std::collections::BTreeSet;
use std::time::Duration;

use lifesmart_api::{ApiClient, Credentials, Endpoint, ReconnectConfig, TransportConfig};
use secrecy::SecretString;

use crate::error::CoreError;

/// How the account proves who it is.
#[derive(Debug, Clone)]
pub enum UserAuth {
    /// A long-lived user token, used as-is.
    Token(SecretString),
    /// An account password, exchanged for a user token at setup.
    Password(SecretString),
}

/// Configuration for one LifeSmart account.
#[derive(Debug, Clone)]
pub struct IntegrationConfig {
    pub app_key: String,
    pub app_token: SecretString,
    pub user_id: String,
    pub auth: UserAuth,
    /// Vendor region (`""` for the global cluster, `cn`, `us`, `eu`, ...).
    pub region: String,
    /// Override for the REST base URL.
    pub api_base: Option<String>,
    /// Override for the push channel URL.
    pub push_url: Option<String>,
    /// Device ids (`me`) never exposed.
    pub exclude_devices: BTreeSet<String>,
    /// Hub ids (`agt`) whose devices are never exposed.
    pub exclude_hubs: BTreeSet<String>,
    /// Hubs whose automations are exposed.
    pub ai_include_hubs: BTreeSet<String>,
    /// Automation ids exposed from those hubs.
    pub ai_include_devices: BTreeSet<String>,
    /// REST request timeout.
    pub timeout: Duration,
    /// Push channel reconnect policy.
    pub reconnect: ReconnectConfig,
    /// Open the push channel after setup.
    pub push_enabled: bool,
}

impl IntegrationConfig {
    pub fn new(
        app_key: impl Into<String>,
        app_token: SecretString,
        user_id: impl Into<String>,
        auth: UserAuth,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            app_token,
            user_id: user_id.into(),
            auth,
            region: String::new(),
            api_base: None,
            push_url: None,
            exclude_devices: BTreeSet::new(),
            exclude_hubs: BTreeSet::new(),
            ai_include_hubs: BTreeSet::new(),
            ai_include_devices: BTreeSet::new(),
            timeout: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
            push_enabled: true,
        }
    }

    /// REST and push endpoints, with overrides applied.
    pub fn endpoint(&self) -> Result<Endpoint, CoreError> {
        let mut endpoint = Endpoint::for_region(&self.region)?;
        if let Some(ref base) = self.api_base {
            endpoint = endpoint.with_api_base(base)?;
        }
        if let Some(ref push) = self.push_url {
            endpoint = endpoint.with_push_url(push)?;
        }
        Ok(endpoint)
    }

    /// Signing credentials. Carries the user token only for token auth.
    pub fn credentials(&self) -> Credentials {
        let credentials = Credentials::new(self.app_key.clone(), self.app_token.clone(), self.user_id.clone());
        match self.auth {
            UserAuth::Token(ref token) => credentials.with_user_token(token.clone()),
            UserAuth::Password(_) => credentials,
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig::default().with_timeout(self.timeout)
    }

    /// Build a signed client, logging in first for password auth.
    ///
    /// A rejected login is reported as [`CoreError::AuthenticationFailed`].
    pub async fn connect(&self) -> Result<ApiClient, CoreError> {
        let endpoint = self.endpoint()?;
        let transport = self.transport();
        let client = match self.auth {
            UserAuth::Token(_) => ApiClient::new(endpoint, self.credentials(), &transport)?,
            UserAuth::Password(ref password) => {
                ApiClient::login(endpoint, self.credentials(), password, &transport).await?
            }
        };
        Ok(client)
    }

    /// Whether a device is excluded by id or by hub.
    pub fn is_excluded(&self, hub: &str, device: &str) -> bool {
        self.exclude_hubs.contains(hub) || self.exclude_devices.contains(device)
    }

    /// Whether an automation event from `hub`/`automation` is opted in.
    pub fn is_automation_included(&self, hub: &str, automation: &str) -> bool {
        self.ai_include_hubs.contains(hub) && self.ai_include_devices.contains(automation)
    }
}
