//! Configuration for LifeSmart integrations.
//!
//! TOML profiles, secret resolution (env var name, then plaintext), and
//! translation to `lifesmart_core::IntegrationConfig`. Lists accept either
//! TOML arrays or comma-separated strings.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use lifesmart_core::{IntegrationConfig, ReconnectConfig, UserAuth};

/// Environment prefix. Nested keys are separated by `__`, e.g.
/// `LIFESMART_PROFILES__HOME__REGION=eu`.
pub const ENV_PREFIX: &str = "LIFESMART_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile, falling back to `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());
        match self.profiles.get(&name) {
            Some(profile) => Ok((name, profile)),
            None => Err(ConfigError::Validation {
                field: "profile".into(),
                reason: format!("no profile named '{name}'"),
            }),
        }
    }
}

/// Settings shared by every profile unless overridden.
#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// REST timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Wait after a push session ends, in seconds.
    #[serde(default = "default_reconnect_cooldown")]
    pub reconnect_cooldown: u64,

    /// Backoff cap for failed reconnects, in seconds.
    #[serde(default = "default_reconnect_max_delay")]
    pub reconnect_max_delay: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            reconnect_cooldown: default_reconnect_cooldown(),
            reconnect_max_delay: default_reconnect_max_delay(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_reconnect_cooldown() -> u64 {
    10
}
fn default_reconnect_max_delay() -> u64 {
    300
}
fn default_push() -> bool {
    true
}

/// One LifeSmart account.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    pub app_key: String,

    /// App token (plaintext; prefer `app_token_env`).
    pub app_token: Option<String>,
    /// Environment variable holding the app token.
    pub app_token_env: Option<String>,

    pub user_id: String,

    /// Long-lived user token (plaintext; prefer `user_token_env`).
    pub user_token: Option<String>,
    pub user_token_env: Option<String>,

    /// Account password, used when no user token is available.
    pub password: Option<String>,
    pub password_env: Option<String>,

    /// Vendor region; empty selects the global cluster.
    #[serde(default)]
    pub region: String,

    /// Override for the REST base URL.
    pub api_base: Option<String>,
    /// Override for the push channel URL.
    pub push_url: Option<String>,

    #[serde(default, deserialize_with = "string_or_list")]
    pub exclude_devices: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub exclude_hubs: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub ai_include_hubs: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub ai_include_devices: Vec<String>,

    /// Open the push channel.
    #[serde(default = "default_push")]
    pub push: bool,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Give up reconnecting after this many consecutive failures.
    pub max_retries: Option<u32>,
}

/// Accept `["a", "b"]` or `"a, b"`; blanks are dropped.
fn string_or_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Text(String),
    }

    let items = match Raw::deserialize(d)? {
        Raw::List(items) => items,
        Raw::Text(text) => text.split(',').map(str::to_owned).collect(),
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect())
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "lifesmart", "lifesmart").map_or_else(
        || PathBuf::from(".lifesmart").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the platform path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Secret resolution ───────────────────────────────────────────────

/// Named environment variable first, then the plaintext value.
pub fn resolve_secret(env_name: Option<&str>, plaintext: Option<&str>) -> Option<SecretString> {
    if let Some(val) = env_name.and_then(|name| std::env::var(name).ok()) {
        return Some(SecretString::from(val));
    }
    plaintext.map(|s| SecretString::from(s.to_owned()))
}

/// Resolve how the account authenticates. A user token wins over a password.
pub fn resolve_user_auth(profile: &Profile, profile_name: &str) -> Result<UserAuth, ConfigError> {
    if let Some(token) = resolve_secret(profile.user_token_env.as_deref(), profile.user_token.as_deref()) {
        return Ok(UserAuth::Token(token));
    }
    if let Some(password) = resolve_secret(profile.password_env.as_deref(), profile.password.as_deref()) {
        return Ok(UserAuth::Password(password));
    }
    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Translation ─────────────────────────────────────────────────────

/// Build an `IntegrationConfig` from a profile.
pub fn profile_to_integration_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<IntegrationConfig, ConfigError> {
    if profile.app_key.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "app_key".into(),
            reason: "must not be empty".into(),
        });
    }
    if profile.user_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "user_id".into(),
            reason: "must not be empty".into(),
        });
    }
    let app_token = resolve_secret(profile.app_token_env.as_deref(), profile.app_token.as_deref())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;
    let auth = resolve_user_auth(profile, profile_name)?;

    validate_url("api_base", profile.api_base.as_deref())?;
    validate_url("push_url", profile.push_url.as_deref())?;

    let mut config = IntegrationConfig::new(profile.app_key.trim(), app_token, profile.user_id.trim(), auth);
    config.region.clone_from(&profile.region);
    config.api_base.clone_from(&profile.api_base);
    config.push_url.clone_from(&profile.push_url);
    config.exclude_devices = to_set(&profile.exclude_devices);
    config.exclude_hubs = to_set(&profile.exclude_hubs);
    config.ai_include_hubs = to_set(&profile.ai_include_hubs);
    config.ai_include_devices = to_set(&profile.ai_include_devices);
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.reconnect = ReconnectConfig {
        cooldown: Duration::from_secs(defaults.reconnect_cooldown),
        max_delay: Duration::from_secs(defaults.reconnect_max_delay),
        max_retries: profile.max_retries,
    };
    config.push_enabled = profile.push;
    Ok(config)
}

/// Load the platform config and translate one profile.
pub fn load_integration_config(profile: Option<&str>) -> Result<IntegrationConfig, ConfigError> {
    let config = load_config()?;
    let (name, profile) = config.profile(profile)?;
    profile_to_integration_config(profile, &name, &config.defaults)
}

fn validate_url(field: &str, value: Option<&str>) -> Result<(), ConfigError> {
    match value {
        Some(raw) => url::Url::parse(raw).map(|_| ()).map_err(|e| ConfigError::Validation {
            field: field.into(),
            reason: format!("invalid URL {raw}: {e}"),
        }),
        None => Ok(()),
    }
}

fn to_set(items: &[String]) -> BTreeSet<String> {
    items.iter().cloned().collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn profile(text: &str) -> Profile {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn lists_accept_comma_separated_strings() {
        let p = profile(
            r#"
            app_key = "ak"
            user_id = "u"
            exclude_devices = "a1, b2,,c3 "
            exclude_hubs = ["HUB1", " HUB2 "]
            "#,
        );
        assert_eq!(p.exclude_devices, vec!["a1", "b2", "c3"]);
        assert_eq!(p.exclude_hubs, vec!["HUB1", "HUB2"]);
        assert!(p.ai_include_hubs.is_empty());
        assert!(p.push);
    }

    #[test]
    fn user_token_wins_over_password() {
        let p = profile(
            r#"
            app_key = "ak"
            user_id = "u"
            user_token = "ut"
            password = "pw"
            "#,
        );
        match resolve_user_auth(&p, "home").unwrap() {
            UserAuth::Token(t) => assert_eq!(t.expose_secret(), "ut"),
            UserAuth::Password(_) => panic!("expected token auth"),
        }
    }

    #[test]
    fn missing_credentials() {
        let p = profile(
            r#"
            app_key = "ak"
            app_token = "at"
            user_id = "u"
            "#,
        );
        let err = profile_to_integration_config(&p, "home", &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { ref profile } if profile == "home"));
    }

    #[test]
    fn unset_env_var_falls_back_to_plaintext() {
        let secret = resolve_secret(Some("LIFESMART_TEST_SURELY_UNSET_VARIABLE"), Some("plain")).unwrap();
        assert_eq!(secret.expose_secret(), "plain");
        assert!(resolve_secret(None, None).is_none());
    }

    #[test]
    fn translation_applies_defaults_and_overrides() {
        let p = profile(
            r#"
            app_key = "ak"
            app_token = "at"
            user_id = "u"
            password = "pw"
            region = "eu"
            ai_include_hubs = "HUB1"
            ai_include_devices = "12,13"
            max_retries = 5
            timeout = 5
            "#,
        );
        let cfg = profile_to_integration_config(&p, "home", &Defaults::default()).unwrap();
        assert_eq!(cfg.region, "eu");
        assert_eq!(cfg.timeout, Duration::from_secs(5));
        assert_eq!(cfg.reconnect.cooldown, Duration::from_secs(10));
        assert_eq!(cfg.reconnect.max_retries, Some(5));
        assert!(cfg.is_automation_included("HUB1", "13"));
        assert!(matches!(cfg.auth, UserAuth::Password(_)));
    }

    #[test]
    fn bad_override_url_is_rejected() {
        let p = profile(
            r#"
            app_key = "ak"
            app_token = "at"
            user_id = "u"
            user_token = "ut"
            api_base = "not a url"
            "#,
        );
        let err = profile_to_integration_config(&p, "home", &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "api_base"));
    }
}
