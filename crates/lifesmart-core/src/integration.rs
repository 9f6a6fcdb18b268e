// ── Integration lifecycle ──
//
// One instance per configured account. Owns the client, the device and
// entity stores, the push subscription, and the router task. Cheaply
// cloneable; every clone drives the same instance.

use std::sync::Arc;

use lifesmart_api::{ApiClient, IoMessage, PushState};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{DeviceApi, PushLink};
use crate::command::{Command, CommandOutcome, encode};
use crate::config::IntegrationConfig;
use crate::error::CoreError;
use crate::inventory;
use crate::model::EntityId;
use crate::router::Router;
use crate::store::{DeviceStore, EntityRegistry, StateChanged};
use crate::stream::{EntityWatch, RegistrySnapshot};

// ── Integration ──────────────────────────────────────────────────────

/// A running LifeSmart integration.
pub struct Integration<A: DeviceApi> {
    inner: Arc<IntegrationInner<A>>,
}

impl<A: DeviceApi> Clone for Integration<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct IntegrationInner<A> {
    config: Arc<IntegrationConfig>,
    api: A,
    registry: Arc<EntityRegistry>,
    devices: Arc<DeviceStore>,
    router: Arc<Router>,
    push_state: Arc<watch::Sender<PushState>>,
    cancel: CancellationToken,
    link: Mutex<Option<PushLink>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Integration<ApiClient> {
    /// Resolve a session for `config`, then [`setup`](Self::setup).
    pub async fn connect(config: IntegrationConfig) -> Result<Self, CoreError> {
        let client = config.connect().await?;
        debug!(user_id = %client.signer().credentials().user_id, "session ready");
        Self::setup(client, config).await
    }
}

impl<A: DeviceApi> Integration<A> {
    /// Load the inventory, register entities, and start live updates.
    ///
    /// Fails without registering anything when the cloud rejects the
    /// account or the inventory cannot be read.
    pub async fn setup(api: A, config: IntegrationConfig) -> Result<Self, CoreError> {
        let loaded = inventory::load(&api, &config).await?;

        let config = Arc::new(config);
        let registry = Arc::new(EntityRegistry::new());
        let devices = Arc::new(DeviceStore::new());
        for entity in loaded.entities {
            registry.register(entity);
        }
        for device in loaded.devices {
            devices.insert(device);
        }

        let router = Arc::new(Router::new(
            Arc::clone(&config),
            Arc::clone(&registry),
            Arc::clone(&devices),
        ));
        let (push_state, _) = watch::channel(PushState::Disconnected);

        let integration = Self {
            inner: Arc::new(IntegrationInner {
                config,
                api,
                registry,
                devices,
                router,
                push_state: Arc::new(push_state),
                cancel: CancellationToken::new(),
                link: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        };

        if integration.inner.config.push_enabled {
            integration.start_push().await?;
        }

        info!(
            entities = integration.inner.registry.len(),
            devices = integration.inner.devices.len(),
            "integration ready"
        );
        Ok(integration)
    }

    async fn start_push(&self) -> Result<(), CoreError> {
        let inner = &self.inner;
        let (link, rx) = inner
            .api
            .subscribe(&inner.config.reconnect, inner.cancel.child_token())?;

        let mut handles = inner.task_handles.lock().await;
        handles.push(tokio::spawn(mirror_push_state(
            link.watch_state(),
            Arc::clone(&inner.push_state),
            inner.cancel.clone(),
        )));
        handles.push(tokio::spawn(router_task(
            Arc::clone(&inner.router),
            rx,
            inner.cancel.clone(),
        )));
        *inner.link.lock().await = Some(link);
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &IntegrationConfig {
        &self.inner.config
    }

    pub fn api(&self) -> &A {
        &self.inner.api
    }

    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.inner.registry
    }

    pub fn devices(&self) -> &Arc<DeviceStore> {
        &self.inner.devices
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.inner.registry.snapshot()
    }

    pub fn subscribe(&self, id: &EntityId) -> Option<EntityWatch> {
        self.inner.registry.subscribe(id)
    }

    pub fn changes(&self) -> broadcast::Receiver<StateChanged> {
        self.inner.registry.changes()
    }

    pub fn push_state(&self) -> PushState {
        *self.inner.push_state.borrow()
    }

    pub fn watch_push_state(&self) -> watch::Receiver<PushState> {
        self.inner.push_state.subscribe()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Encode and submit a command.
    ///
    /// Calls go out in order and stop at the first non-zero result code.
    /// The optimistic state change is applied only when every call
    /// succeeded.
    pub async fn execute(&self, command: Command) -> Result<CommandOutcome, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ShutDown);
        }

        let target = match command.entity() {
            Some(id) => Some(
                self.inner
                    .registry
                    .get(id)
                    .ok_or_else(|| CoreError::EntityNotFound(id.clone()))?,
            ),
            None => None,
        };
        let plan = encode(&command, target.as_deref())?;

        let mut submitted = 0;
        let mut code = 0;
        for call in &plan.calls {
            code = self.inner.api.send_command(call).await?;
            submitted += 1;
            if code != 0 {
                warn!(command = command.name(), code, submitted, "command rejected");
                return Err(CoreError::CommandRejected { code });
            }
        }

        let applied = match command.entity() {
            Some(id) if !plan.optimistic.is_empty() => self.inner.registry.apply(id, &plan.optimistic),
            _ => false,
        };
        debug!(command = command.name(), submitted, applied, "command executed");

        Ok(CommandOutcome {
            code,
            submitted,
            applied,
        })
    }

    /// Re-read one device and re-apply every channel. Returns how many
    /// channels updated a registered entity.
    pub async fn refresh_device(&self, hub: &str, device: &str) -> Result<usize, CoreError> {
        if self.inner.config.is_excluded(hub, device) {
            return Err(CoreError::DeviceNotFound {
                hub: hub.to_owned(),
                device: device.to_owned(),
            });
        }
        let raw = self.inner.api.get_device(hub, device).await?;
        let applied = self.inner.router.replay(&raw);
        self.inner.devices.insert(raw);
        debug!(hub, device, applied, "device refreshed");
        Ok(applied)
    }

    // ── Shutdown ─────────────────────────────────────────────────────

    /// Stop live updates and wait for every background task to exit.
    ///
    /// No update is applied after this returns. Idempotent.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        if let Some(link) = self.inner.link.lock().await.take() {
            self.inner.api.unsubscribe(link).await;
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }

        self.inner.push_state.send_replace(PushState::Disconnected);
        debug!("integration shut down");
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn router_task(router: Arc<Router>, rx: mpsc::Receiver<IoMessage>, cancel: CancellationToken) {
    router.run(rx, cancel).await;
}

/// Follow the push channel's lifecycle until cancelled.
async fn mirror_push_state(
    mut source: watch::Receiver<PushState>,
    target: Arc<watch::Sender<PushState>>,
    cancel: CancellationToken,
) {
    loop {
        let state = *source.borrow_and_update();
        target.send_replace(state);
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = source.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
