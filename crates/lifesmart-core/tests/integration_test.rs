// End-to-end tests for `Integration` against an in-memory cloud.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use lifesmart_api::{IoPoint, Scene};
use lifesmart_core::{
    ApiCall, Command, CoreError, DeviceApi, EntityId, EntityState, HvacMode, Integration,
    IntegrationConfig, IoMessage, PushLink, PushState, RawDevice, ReconnectConfig, UserAuth,
};

// ── Fake cloud ──────────────────────────────────────────────────────

struct FakeCloud {
    devices: Vec<RawDevice>,
    scenes: Vec<Scene>,
    reject_login: bool,
    codes: Mutex<VecDeque<i64>>,
    sent: Mutex<Vec<ApiCall>>,
    push_tx: Mutex<Option<mpsc::Sender<IoMessage>>>,
    push_state: watch::Sender<PushState>,
}

impl FakeCloud {
    fn new(devices: Vec<RawDevice>) -> Self {
        Self {
            devices,
            scenes: Vec::new(),
            reject_login: false,
            codes: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            push_tx: Mutex::new(None),
            push_state: watch::channel(PushState::Disconnected).0,
        }
    }

    fn reply_with(&self, codes: &[i64]) {
        self.codes.lock().unwrap().extend(codes.iter().copied());
    }

    fn sent(&self) -> Vec<ApiCall> {
        self.sent.lock().unwrap().clone()
    }

    async fn push(&self, msg: IoMessage) -> bool {
        let tx = self.push_tx.lock().unwrap().clone();
        match tx {
            Some(tx) => tx.send(msg).await.is_ok(),
            None => false,
        }
    }
}

impl DeviceApi for FakeCloud {
    fn get_devices(&self) -> impl Future<Output = Result<Vec<RawDevice>, CoreError>> + Send {
        let result = if self.reject_login {
            Err(CoreError::AuthenticationFailed {
                message: "bad token".into(),
            })
        } else {
            Ok(self.devices.clone())
        };
        async move { result }
    }

    fn get_device(&self, hub: &str, device: &str) -> impl Future<Output = Result<RawDevice, CoreError>> + Send {
        let result = self
            .devices
            .iter()
            .find(|d| d.agt == hub && d.me == device)
            .cloned()
            .ok_or_else(|| CoreError::DeviceNotFound {
                hub: hub.to_owned(),
                device: device.to_owned(),
            });
        async move { result }
    }

    fn get_scenes(&self, _hub: &str) -> impl Future<Output = Result<Vec<Scene>, CoreError>> + Send {
        let scenes = self.scenes.clone();
        async move { Ok(scenes) }
    }

    fn send_command(&self, call: &ApiCall) -> impl Future<Output = Result<i64, CoreError>> + Send {
        self.sent.lock().unwrap().push(call.clone());
        let code = self.codes.lock().unwrap().pop_front().unwrap_or(0);
        async move { Ok(code) }
    }

    fn get_remote_list(&self, _hub: &str) -> impl Future<Output = Result<serde_json::Value, CoreError>> + Send {
        async move { Ok(serde_json::json!({"AI_IR_1": {"category": "tv", "brand": "lg"}})) }
    }

    fn subscribe(
        &self,
        _reconnect: &ReconnectConfig,
        _cancel: CancellationToken,
    ) -> Result<(PushLink, mpsc::Receiver<IoMessage>), CoreError> {
        let (tx, rx) = mpsc::channel(16);
        *self.push_tx.lock().unwrap() = Some(tx);
        self.push_state.send_replace(PushState::Live);
        Ok((PushLink::new(self.push_state.subscribe(), None), rx))
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

fn point(kind: i64, val: i64) -> IoPoint {
    IoPoint {
        kind: Some(kind),
        val: Some(val),
        ..IoPoint::default()
    }
}

fn device(me: &str, devtype: &str, data: Vec<(&str, IoPoint)>) -> RawDevice {
    RawDevice {
        agt: "HUB1".into(),
        me: me.into(),
        devtype: devtype.into(),
        name: format!("{devtype} {me}"),
        ver: Some("0.1".into()),
        stat: Some(1),
        data: data.into_iter().map(|(k, p)| (k.to_owned(), p)).collect(),
    }
}

fn fleet() -> Vec<RawDevice> {
    vec![
        device(
            "a1",
            "SL_OE_DE",
            vec![("P1", point(0x80, 0)), ("P2", IoPoint { v: Some(1.5), ..IoPoint::default() })],
        ),
        device("b2", "V_AIR_P", vec![("MODE", point(0xce, 3)), ("O", point(0x80, 0))]),
        device("c3", "SL_SW_IF3", vec![("L1", point(0x81, 1))]),
        device("d4", "SL_SPOT", vec![("RGB", point(0x81, 0x00FF_0000))]),
    ]
}

fn config() -> IntegrationConfig {
    IntegrationConfig::new(
        "APPKEY",
        SecretString::from("APPTOKEN"),
        "10001",
        UserAuth::Token(SecretString::from("USERTOKEN")),
    )
}

fn id(s: &str) -> EntityId {
    s.parse().unwrap()
}

fn io(idx: &str, devtype: &str, me: &str) -> IoMessage {
    IoMessage {
        devtype: devtype.into(),
        agt: "HUB1".into(),
        me: me.into(),
        idx: idx.into(),
        kind: None,
        val: None,
        v: None,
        ts: None,
        stat: None,
    }
}

async fn setup(cloud: FakeCloud, config: IntegrationConfig) -> Integration<FakeCloud> {
    Integration::setup(cloud, config).await.unwrap()
}

// ── Setup ───────────────────────────────────────────────────────────

#[tokio::test]
async fn setup_registers_inventory() {
    let integration = setup(FakeCloud::new(fleet()), config()).await;
    let ids: Vec<String> = integration.snapshot().iter().map(|e| e.id.to_string()).collect();

    assert_eq!(
        ids,
        vec![
            "switch.sl_oe_de_hub1_a1_p1",
            "switch.sl_sw_if3_hub1_c3_l1",
            "sensor.sl_oe_de_hub1_a1_p2",
            "light.sl_spot_hub1_d4_rgb",
            "climate.v_air_p_hub1_b2",
        ]
    );
    assert_eq!(integration.push_state(), PushState::Live);

    let spot = integration.registry().get(&id("light.sl_spot_hub1_d4_rgb")).unwrap();
    assert!(spot.attribute("remotes").is_some());

    integration.shutdown().await;
}

#[tokio::test]
async fn rejected_account_registers_nothing() {
    let mut cloud = FakeCloud::new(fleet());
    cloud.reject_login = true;

    let err = Integration::setup(cloud, config()).await.err().unwrap();
    assert!(err.is_auth_failure());
}

#[tokio::test]
async fn excluded_devices_are_not_registered() {
    let mut cfg = config();
    cfg.exclude_devices.insert("a1".into());
    let integration = setup(FakeCloud::new(fleet()), cfg).await;

    assert!(integration.registry().get(&id("switch.sl_oe_de_hub1_a1_p1")).is_none());
    assert!(integration.registry().get(&id("switch.sl_sw_if3_hub1_c3_l1")).is_some());
    assert!(integration.devices().get("HUB1", "a1").is_none());

    integration.shutdown().await;
}

// ── Live updates ────────────────────────────────────────────────────

#[tokio::test]
async fn push_updates_reach_subscribers() {
    let integration = setup(FakeCloud::new(fleet()), config()).await;
    let mut switch = integration.subscribe(&id("switch.sl_oe_de_hub1_a1_p1")).unwrap();
    let mut sensor = integration
        .subscribe(&id("sensor.sl_oe_de_hub1_a1_p2"))
        .unwrap()
        .into_stream();

    let mut msg = io("P1", "SL_OE_DE", "a1");
    msg.kind = Some(9);
    msg.val = Some(0);
    assert!(integration.api().push(msg).await);
    let entity = tokio::time::timeout(Duration::from_secs(2), switch.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entity.state, EntityState::On);

    let mut msg = io("P2", "SL_OE_DE", "a1");
    msg.v = Some(230.5);
    integration.api().push(msg).await;
    // The stream starts with the current value; skip ahead to the reading.
    let entity = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(entity) = sensor.next().await {
            if entity.state == EntityState::Number(230.5) {
                return Some(entity);
            }
        }
        None
    })
    .await
    .unwrap()
    .unwrap();
    assert_eq!(
        entity.attribute("unit_of_measurement").and_then(|v| v.as_str()),
        Some("W")
    );

    integration.shutdown().await;
}

#[tokio::test]
async fn automation_events_follow_opt_in() {
    let mut cloud = FakeCloud::new(Vec::new());
    cloud.scenes = vec![
        Scene {
            id: "12".into(),
            name: "Movie".into(),
        },
        Scene {
            id: "13".into(),
            name: "Away".into(),
        },
    ];
    let mut cfg = config();
    cfg.ai_include_hubs.insert("HUB1".into());
    cfg.ai_include_devices.insert("12".into());

    let integration = setup(cloud, cfg).await;
    assert_eq!(integration.registry().len(), 1);

    let movie = id("switch.ai_hub1_12_s");
    let mut watch = integration.subscribe(&movie).unwrap();

    let mut msg = io("s", "ai", "12");
    msg.stat = Some(3);
    integration.api().push(msg).await;
    let entity = tokio::time::timeout(Duration::from_secs(2), watch.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entity.state, EntityState::On);

    let outcome = integration
        .execute(Command::TurnOn { entity: movie })
        .await
        .unwrap();
    assert_eq!(outcome.submitted, 1);
    assert_eq!(
        integration.api().sent(),
        vec![ApiCall::Scene {
            hub: "HUB1".into(),
            scene: "12".into()
        }]
    );

    integration.shutdown().await;
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn confirmed_command_updates_state() {
    let integration = setup(FakeCloud::new(fleet()), config()).await;
    let plug = id("switch.sl_oe_de_hub1_a1_p1");

    let outcome = integration
        .execute(Command::TurnOn { entity: plug.clone() })
        .await
        .unwrap();
    assert_eq!(outcome.code, 0);
    assert!(outcome.applied);
    assert_eq!(integration.registry().get(&plug).unwrap().state, EntityState::On);

    integration.shutdown().await;
}

#[tokio::test]
async fn rejected_command_leaves_state_alone() {
    let integration = setup(FakeCloud::new(fleet()), config()).await;
    let plug = id("switch.sl_oe_de_hub1_a1_p1");
    integration.api().reply_with(&[-3]);

    let err = integration
        .execute(Command::TurnOn { entity: plug.clone() })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::CommandRejected { code: -3 }));
    assert_eq!(integration.registry().get(&plug).unwrap().state, EntityState::Off);

    integration.shutdown().await;
}

#[tokio::test]
async fn multi_step_command_stops_at_first_rejection() {
    let integration = setup(FakeCloud::new(fleet()), config()).await;
    let vrv = id("climate.v_air_p_hub1_b2");
    integration.api().reply_with(&[5]);

    let err = integration
        .execute(Command::SetHvacMode {
            entity: vrv.clone(),
            mode: HvacMode::Heat,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::CommandRejected { code: 5 }));
    assert_eq!(integration.api().sent().len(), 1);
    assert_eq!(
        integration.registry().get(&vrv).unwrap().state,
        EntityState::Hvac(HvacMode::Off)
    );

    integration.shutdown().await;
}

#[tokio::test]
async fn unknown_entity_is_an_error() {
    let integration = setup(FakeCloud::new(fleet()), config()).await;
    let err = integration
        .execute(Command::TurnOn {
            entity: id("switch.nope_hub1_x_l1"),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::EntityNotFound(_)));
    assert!(integration.api().sent().is_empty());

    integration.shutdown().await;
}

// ── Refresh & shutdown ──────────────────────────────────────────────

#[tokio::test]
async fn refresh_reapplies_device_channels() {
    let integration = setup(FakeCloud::new(fleet()), config()).await;
    let plug = id("switch.sl_oe_de_hub1_a1_p1");
    integration.execute(Command::TurnOn { entity: plug.clone() }).await.unwrap();

    // The cloud still reports the plug as off.
    let applied = integration.refresh_device("HUB1", "a1").await.unwrap();
    assert_eq!(applied, 2);
    assert_eq!(integration.registry().get(&plug).unwrap().state, EntityState::Off);

    integration.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_routing_and_commands() {
    let integration = setup(FakeCloud::new(fleet()), config()).await;
    integration.shutdown().await;

    assert_eq!(integration.push_state(), PushState::Disconnected);

    let mut msg = io("P1", "SL_OE_DE", "a1");
    msg.kind = Some(0x81);
    assert!(!integration.api().push(msg).await);
    assert_eq!(
        integration.registry().get(&id("switch.sl_oe_de_hub1_a1_p1")).unwrap().state,
        EntityState::Off
    );

    let err = integration
        .execute(Command::TurnOn {
            entity: id("switch.sl_oe_de_hub1_a1_p1"),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ShutDown));
}
