// Push channel with auto-reconnect
//
// Connects to the vendor's `wsapp` endpoint, sends a signed `WbAuth`
// frame as soon as the socket opens, and forwards every `io` frame
// through a bounded `tokio::sync::mpsc` queue in arrival order.
// A single background task owns the socket: a new connection is only
// opened after the previous one has been fully torn down.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::models::{IoMessage, PushFrame};
use crate::sign::Signer;

// ── Queue capacity ───────────────────────────────────────────────────

const IO_QUEUE_CAPACITY: usize = 1024;

// ── PushState ────────────────────────────────────────────────────────

/// Observable lifecycle of the push channel.
///
/// `Authenticating` is left as soon as the auth frame is written; the
/// vendor sends no acknowledgement, so inbound frames are processed
/// immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushState {
    Disconnected,
    Connecting,
    Authenticating,
    Live,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Reconnect policy.
///
/// After a session that went live, the next attempt waits `cooldown`.
/// Each consecutive failed attempt doubles the wait, up to `max_delay`.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Wait after a normal disconnect. Default: 10s.
    pub cooldown: Duration,

    /// Upper bound on backoff delay. Default: 300s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(10),
            max_delay: Duration::from_secs(300),
            max_retries: None,
        }
    }
}

// ── PushChannel ──────────────────────────────────────────────────────

/// Handle to the running push channel task.
pub struct PushChannel {
    state: watch::Receiver<PushState>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PushChannel {
    /// Spawn the connection loop and return the handle plus the IO queue.
    ///
    /// Returns immediately; the first connection attempt happens on the
    /// background task.
    pub fn spawn(
        url: Url,
        signer: Signer,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<IoMessage>) {
        let (io_tx, io_rx) = mpsc::channel(IO_QUEUE_CAPACITY);
        let (state_tx, state_rx) = watch::channel(PushState::Disconnected);

        let task = tokio::spawn(push_loop(
            url,
            signer,
            io_tx,
            state_tx,
            reconnect,
            cancel.clone(),
        ));

        let channel = Self {
            state: state_rx,
            cancel,
            task: Mutex::new(Some(task)),
        };
        (channel, io_rx)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PushState {
        *self.state.borrow()
    }

    /// Subscribe to lifecycle changes.
    pub fn watch_state(&self) -> watch::Receiver<PushState> {
        self.state.clone()
    }

    /// Stop the loop and wait for the background task to exit.
    ///
    /// Once this returns no further frames are read or forwarded.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "push channel task ended abnormally");
            }
        }
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → authenticate → read → wait → reconnect.
async fn push_loop(
    url: Url,
    signer: Signer,
    io_tx: mpsc::Sender<IoMessage>,
    state: watch::Sender<PushState>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut failures: u32 = 0;

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&url, &signer, &io_tx, &state, &cancel) => result,
        };
        state.send_replace(PushState::Disconnected);

        if cancel.is_cancelled() {
            break;
        }

        match result {
            Ok(()) => {
                tracing::info!("push channel session ended");
                failures = 0;
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                tracing::warn!(error = %e, failures, "push channel connect failed");

                if let Some(max) = reconnect.max_retries {
                    if failures > max {
                        tracing::error!(
                            max_retries = max,
                            "push channel reconnection limit reached, giving up"
                        );
                        break;
                    }
                }
            }
        }

        let delay = reconnect_delay(failures, &reconnect);
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            failures,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    state.send_replace(PushState::Disconnected);
    tracing::debug!("push channel loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// One session. `Err` means the channel never went live; anything that
/// happens after the auth frame is sent ends the session with `Ok`.
async fn connect_and_read(
    url: &Url,
    signer: &Signer,
    io_tx: &mpsc::Sender<IoMessage>,
    state: &watch::Sender<PushState>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    state.send_replace(PushState::Connecting);
    tracing::info!(url = %url, "connecting push channel");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let (ws_stream, _response) = tokio_tungstenite::connect_async(ClientRequestBuilder::new(uri))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();

    state.send_replace(PushState::Authenticating);
    let auth = signer.push_auth_frame(chrono::Utc::now().timestamp())?;
    write
        .send(tungstenite::Message::text(auth))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    state.send_replace(PushState::Live);
    tracing::info!("push channel live");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return Ok(());
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if let Some(msg) = parse_io_frame(&text) {
                            if io_tx.send(msg).await.is_err() {
                                tracing::debug!("io queue closed, ending session");
                                return Ok(());
                            }
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        tracing::trace!("push channel ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "push channel close frame received"
                            );
                        } else {
                            tracing::info!("push channel close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "push channel transport error");
                        return Ok(());
                    }
                    None => {
                        tracing::info!("push channel stream ended");
                        return Ok(());
                    }
                    _ => {}
                }
            }
        }
    }
}

// ── Frame parsing ────────────────────────────────────────────────────

/// Decode a text frame, keeping only well-formed `io` payloads.
fn parse_io_frame(text: &str) -> Option<IoMessage> {
    let frame: PushFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(error = %e, "dropping unparseable push frame");
            return None;
        }
    };

    if !frame.is_io() {
        tracing::trace!(kind = %frame.kind, "ignoring non-io push frame");
        return None;
    }

    let msg = frame.msg?;
    match serde_json::from_value::<IoMessage>(msg) {
        Ok(io) => Some(io),
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed io payload");
            None
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// `cooldown` after a clean session, otherwise exponential with jitter.
///
/// `delay = min(cooldown * 2^failures, max) * (1 ± 0.25)`
fn reconnect_delay(failures: u32, config: &ReconnectConfig) -> Duration {
    if failures == 0 {
        return config.cooldown;
    }

    let exponent = i32::try_from(failures.min(30)).unwrap_or(30);
    let base = config.cooldown.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the failure count.
    let jitter_factor = 1.0 + 0.25 * (f64::from(failures) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.cooldown, Duration::from_secs(10));
        assert_eq!(config.max_delay, Duration::from_secs(300));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn clean_session_waits_exactly_the_cooldown() {
        let config = ReconnectConfig::default();
        assert_eq!(reconnect_delay(0, &config), Duration::from_secs(10));
    }

    #[test]
    fn backoff_grows_after_failures() {
        let config = ReconnectConfig::default();
        let d1 = reconnect_delay(1, &config);
        let d3 = reconnect_delay(3, &config);
        assert!(d1 > config.cooldown, "d1 ({d1:?}) should exceed the cooldown");
        assert!(d3 > d1, "d3 ({d3:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            cooldown: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
            max_retries: None,
        };
        for failures in [5, 20, u32::MAX] {
            let delay = reconnect_delay(failures, &config);
            // Jitter can stretch the cap by up to 25%.
            assert!(delay <= Duration::from_secs(75), "{failures}: {delay:?}");
        }
    }

    #[test]
    fn io_frames_are_forwarded() {
        let text = r#"{"type":"io","msg":{"devtype":"SL_SW_IF3","agt":"HUB1","me":"2d11","idx":"L1","type":129,"val":1}}"#;
        let msg = parse_io_frame(text).unwrap();
        assert_eq!(msg.devtype, "SL_SW_IF3");
        assert_eq!(msg.kind, Some(129));
    }

    #[test]
    fn non_io_frames_are_dropped() {
        assert!(parse_io_frame(r#"{"type":"ping","msg":{}}"#).is_none());
        assert!(parse_io_frame(r#"{"id":1,"code":0,"message":"success"}"#).is_none());
    }

    #[test]
    fn malformed_frames_are_dropped() {
        assert!(parse_io_frame("not json at all").is_none());
        assert!(parse_io_frame(r#"{"type":"io"}"#).is_none());
        assert!(parse_io_frame(r#"{"type":"io","msg":{"agt":"HUB1"}}"#).is_none());
    }
}
