use thiserror::Error;

/// Top-level error type for the `lifesmart-api` crate.
///
/// Covers every failure mode of the vendor cloud: the auth bootstrap,
/// HTTP transport, signed data calls, and the push channel.
/// `lifesmart-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login or token exchange rejected (wrong password, unknown app key, ...).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// A data call needs a user token but none has been negotiated yet.
    #[error("No user token -- log in first")]
    MissingUserToken,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, ...)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Vendor API ──────────────────────────────────────────────────
    /// The vendor answered with a non-zero result code.
    #[error("LifeSmart API error (code {code}): {message}")]
    Vendor { code: i64, message: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// Push channel connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// Push channel closed by the server.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the credentials were rejected and logging in
    /// again might resolve it.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::MissingUserToken)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } => true,
            _ => false,
        }
    }

    /// The vendor result code, if this error carries one.
    pub fn vendor_code(&self) -> Option<i64> {
        match self {
            Self::Vendor { code, .. } => Some(*code),
            _ => None,
        }
    }
}
