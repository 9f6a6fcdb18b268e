// ── Update routing ──
//
// Resolves each push IO message to the entity it addresses, decodes the
// reading against that entity's current state, and merges the result
// into the registry. Automation events take their own opt-in path.

use std::sync::Arc;

use lifesmart_api::{IoMessage, IoPoint, RawDevice};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::classify::{AUTOMATION_KEY, AUTOMATION_RULE, AUTOMATION_TYPE, classify};
use crate::config::IntegrationConfig;
use crate::decode::{decode, decode_automation};
use crate::error::CoreError;
use crate::identity::{build_identity, identity_for};
use crate::store::{DeviceStore, EntityRegistry};

/// What happened to one routed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Merged into a registered entity.
    Applied,
    /// No registered entity has this identity.
    Unregistered,
    /// The device or its hub is excluded.
    Excluded,
    /// No classification rule covers this channel.
    Unsupported,
    /// An automation event from a hub or automation that is not opted in.
    AutomationFiltered,
}

/// Routes push messages for one integration instance.
pub struct Router {
    config: Arc<IntegrationConfig>,
    registry: Arc<EntityRegistry>,
    devices: Arc<DeviceStore>,
}

impl Router {
    pub fn new(config: Arc<IntegrationConfig>, registry: Arc<EntityRegistry>, devices: Arc<DeviceStore>) -> Self {
        Self {
            config,
            registry,
            devices,
        }
    }

    /// Route one message.
    ///
    /// Only undecodable readings are errors; every kind of miss is an
    /// ordinary outcome.
    pub fn route(&self, msg: &IoMessage) -> Result<RouteOutcome, CoreError> {
        if msg.idx == AUTOMATION_KEY {
            return Ok(self.route_automation(msg));
        }
        self.route_point(&msg.devtype, &msg.agt, &msg.me, &msg.idx, &msg.point())
    }

    fn route_point(
        &self,
        devtype: &str,
        hub: &str,
        device: &str,
        idx: &str,
        point: &IoPoint,
    ) -> Result<RouteOutcome, CoreError> {
        if self.config.is_excluded(hub, device) {
            return Ok(RouteOutcome::Excluded);
        }
        let Some(rule) = classify(devtype, idx) else {
            return Ok(RouteOutcome::Unsupported);
        };

        let id = identity_for(rule, devtype, hub, device, idx);
        let Some(current) = self.registry.get(&id) else {
            self.devices.apply_point(hub, device, idx, point);
            return Ok(RouteOutcome::Unregistered);
        };

        // The device record only takes readings its entity accepted.
        let delta = decode(rule, point, &current)?;
        self.devices.apply_point(hub, device, idx, point);
        if self.registry.apply(&id, &delta) {
            Ok(RouteOutcome::Applied)
        } else {
            Ok(RouteOutcome::Unregistered)
        }
    }

    /// Re-apply every channel of a freshly read device. Returns the
    /// number of channels merged into registered entities.
    pub fn replay(&self, device: &RawDevice) -> usize {
        let mut applied = 0;
        for (idx, point) in &device.data {
            match self.route_point(&device.devtype, &device.agt, &device.me, idx, point) {
                Ok(RouteOutcome::Applied) => applied += 1,
                Ok(_) => {}
                Err(e) => {
                    warn!(hub = %device.agt, device = %device.me, idx = %idx, error = %e, "reading not decodable");
                }
            }
        }
        applied
    }

    fn route_automation(&self, msg: &IoMessage) -> RouteOutcome {
        if !self.config.is_automation_included(&msg.agt, &msg.me) {
            return RouteOutcome::AutomationFiltered;
        }
        let id = build_identity(
            AUTOMATION_RULE.kind,
            AUTOMATION_TYPE,
            &msg.agt,
            &msg.me,
            Some(AUTOMATION_KEY),
        );
        if self.registry.apply(&id, &decode_automation(msg.stat)) {
            RouteOutcome::Applied
        } else {
            RouteOutcome::Unregistered
        }
    }

    /// Route one message, logging instead of returning failures.
    pub fn dispatch(&self, msg: &IoMessage) {
        match self.route(msg) {
            Ok(RouteOutcome::Applied) => {
                trace!(hub = %msg.agt, device = %msg.me, idx = %msg.idx, "update applied");
            }
            Ok(outcome) => {
                debug!(hub = %msg.agt, device = %msg.me, idx = %msg.idx, ?outcome, "update dropped");
            }
            Err(e) => {
                warn!(hub = %msg.agt, device = %msg.me, idx = %msg.idx, error = %e, "update not decodable");
            }
        }
    }

    /// Consume the push queue in arrival order until cancelled or the
    /// queue closes.
    pub async fn run(&self, mut rx: mpsc::Receiver<IoMessage>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(msg) => self.dispatch(&msg),
                    None => break,
                },
            }
        }
        debug!("router stopped");
    }
}
