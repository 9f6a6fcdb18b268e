// ── Core error types ──
//
// User-facing errors from lifesmart-core. Callers never see HTTP status
// codes or JSON parse failures directly. The `From<lifesmart_api::Error>`
// impl translates transport-layer errors into domain-appropriate variants.

use thiserror::Error;

use crate::codec::DecodeError;
use crate::model::EntityId;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Setup errors ─────────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Cannot reach the LifeSmart cloud: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Integration has been shut down")]
    ShutDown,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Entity not registered: {0}")]
    EntityNotFound(EntityId),

    #[error("Device not found: {hub}/{device}")]
    DeviceNotFound { hub: String, device: String },

    #[error("Undecodable IO value: {0}")]
    Decode(#[from] DecodeError),

    // ── Command errors ───────────────────────────────────────────────
    #[error("{entity} does not support {operation}")]
    Unsupported { entity: EntityId, operation: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    /// The vendor answered a write with a non-zero result code.
    #[error("Command rejected by LifeSmart (code {code})")]
    CommandRejected { code: i64 },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api { message: String, code: Option<i64> },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<lifesmart_api::Error> for CoreError {
    fn from(err: lifesmart_api::Error) -> Self {
        use lifesmart_api::Error as Api;

        match err {
            Api::Authentication { message } => Self::AuthenticationFailed { message },
            Api::MissingUserToken => Self::AuthenticationFailed {
                message: "no user token available".into(),
            },
            Api::Transport(ref e) if e.is_connect() || e.is_timeout() => Self::ConnectionFailed {
                reason: e.to_string(),
            },
            Api::WebSocketConnect(reason) => Self::ConnectionFailed { reason },
            Api::Vendor { code, message } => Self::Api {
                message,
                code: Some(code),
            },
            Api::InvalidUrl(e) => Self::Config {
                message: format!("invalid endpoint URL: {e}"),
            },
            other => Self::Api {
                message: other.to_string(),
                code: other.vendor_code(),
            },
        }
    }
}

impl CoreError {
    /// Returns `true` if the failure happened while proving who we are.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}
