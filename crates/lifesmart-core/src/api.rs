// ── Device API capability ──
//
// The operations the integration needs from the vendor cloud, as one
// explicit interface. `ApiClient` is the production adapter; tests plug
// in an in-memory fake.

use std::future::Future;

use lifesmart_api::{ApiClient, IoMessage, PushChannel, PushState, RawDevice, ReconnectConfig, Scene};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::command::ApiCall;
use crate::error::CoreError;

// ── PushLink ─────────────────────────────────────────────────────────

/// Handle to an active push subscription.
pub struct PushLink {
    channel: Option<PushChannel>,
    state: watch::Receiver<PushState>,
}

impl PushLink {
    /// `channel` is the task to stop on close; `None` when the
    /// subscription is driven by something the caller owns.
    pub fn new(state: watch::Receiver<PushState>, channel: Option<PushChannel>) -> Self {
        Self { channel, state }
    }

    pub fn state(&self) -> PushState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<PushState> {
        self.state.clone()
    }

    /// Stop the underlying channel and wait for its task to exit.
    pub async fn close(self) {
        if let Some(channel) = self.channel {
            channel.shutdown().await;
        }
    }
}

// ── DeviceApi ────────────────────────────────────────────────────────

/// Typed client abstraction used by the integration.
pub trait DeviceApi: Send + Sync + 'static {
    /// Full inventory across every hub on the account.
    fn get_devices(&self) -> impl Future<Output = Result<Vec<RawDevice>, CoreError>> + Send;

    fn get_device(
        &self,
        hub: &str,
        device: &str,
    ) -> impl Future<Output = Result<RawDevice, CoreError>> + Send;

    /// Automations stored on one hub.
    fn get_scenes(&self, hub: &str) -> impl Future<Output = Result<Vec<Scene>, CoreError>> + Send;

    /// Submit one write. The vendor result code is returned as-is.
    fn send_command(&self, call: &ApiCall) -> impl Future<Output = Result<i64, CoreError>> + Send;

    fn get_remote_list(
        &self,
        hub: &str,
    ) -> impl Future<Output = Result<serde_json::Value, CoreError>> + Send;

    /// Open the push channel. IO messages arrive on the returned queue in
    /// the order the cloud sent them.
    fn subscribe(
        &self,
        reconnect: &ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<(PushLink, mpsc::Receiver<IoMessage>), CoreError>;

    /// Close a link returned by [`subscribe`](Self::subscribe).
    fn unsubscribe(&self, link: PushLink) -> impl Future<Output = ()> + Send {
        link.close()
    }
}

impl DeviceApi for ApiClient {
    fn get_devices(&self) -> impl Future<Output = Result<Vec<RawDevice>, CoreError>> + Send {
        async move { Ok(self.get_all_devices().await?) }
    }

    fn get_device(
        &self,
        hub: &str,
        device: &str,
    ) -> impl Future<Output = Result<RawDevice, CoreError>> + Send {
        let (hub, device) = (hub.to_owned(), device.to_owned());
        async move { Ok(ApiClient::get_device(self, &hub, &device).await?) }
    }

    fn get_scenes(&self, hub: &str) -> impl Future<Output = Result<Vec<Scene>, CoreError>> + Send {
        let hub = hub.to_owned();
        async move { Ok(ApiClient::get_scenes(self, &hub).await?) }
    }

    fn send_command(&self, call: &ApiCall) -> impl Future<Output = Result<i64, CoreError>> + Send {
        let call = call.clone();
        async move {
            let code = match &call {
                ApiCall::Io(write) => self.set_io(write).await?,
                ApiCall::Scene { hub, scene } => self.set_scene(hub, scene).await?,
                ApiCall::IrKeys(keys) => self.send_ir_keys(keys).await?,
                ApiCall::IrCodes(codes) => self.send_ir_codes(codes).await?,
                ApiCall::AcKeys(keys) => self.send_ac_keys(keys).await?,
            };
            Ok(code)
        }
    }

    fn get_remote_list(
        &self,
        hub: &str,
    ) -> impl Future<Output = Result<serde_json::Value, CoreError>> + Send {
        let hub = hub.to_owned();
        async move { Ok(ApiClient::get_remote_list(self, &hub).await?) }
    }

    fn subscribe(
        &self,
        reconnect: &ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<(PushLink, mpsc::Receiver<IoMessage>), CoreError> {
        let (channel, rx) = PushChannel::spawn(
            self.endpoint().push_url().clone(),
            self.signer().clone(),
            reconnect.clone(),
            cancel,
        );
        Ok((PushLink::new(channel.watch_state(), Some(channel)), rx))
    }
}
