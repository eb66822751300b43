use std::time::Duration;

use app::{Core, NetworkIdentity};
use client::{ClientSession, ModuleState};
use network_shared::{ModuleKind, SERVER_CLIENT_ID};
use scene::{
    ChangeOrigin, LightNode, LightType, NodeKind, ParameterValue, SceneData, SceneNode, Transform,
    param_ids,
};
use server::{ServerEndpoints, SyncServer};
use settings::SyncSettings;

const WAIT: Duration = Duration::from_secs(10);

fn settings() -> SyncSettings {
    let mut settings = SyncSettings::default();
    settings.network.scene_port = 0;
    settings.network.update_port = 0;
    settings.network.collect_port = 0;
    settings.network.receive_timeout_ms = 50;
    settings.network.request_timeout_ms = 2000;
    // keep the master clock from moving client clocks during the test
    settings.clock.sync_interval_ticks = u16::MAX;
    settings
}

fn stage() -> SceneData {
    let node = |name: &str, editable, child_count, kind| SceneNode {
        name: String::from(name),
        editable,
        child_count,
        transform: Transform::default(),
        kind,
    };
    SceneData {
        nodes: vec![
            node("stage", false, 2, NodeKind::Group),
            node("chair", true, 0, NodeKind::Group),
            node(
                "key",
                false,
                0,
                NodeKind::Light(LightNode {
                    light_type: LightType::Point,
                    intensity: 2.0,
                    angle: 0.0,
                    range: 10.0,
                    color: [1.0, 0.9, 0.8],
                }),
            ),
        ],
        ..SceneData::default()
    }
}

async fn start_server() -> SyncServer {
    let core = Core::new(
        settings(),
        NetworkIdentity {
            client_id: SERVER_CLIENT_ID,
            is_server: true,
        },
    );
    core.scene().load_data(stage()).unwrap();
    SyncServer::bind_tcp(core, "127.0.0.1").await.unwrap()
}

async fn join(endpoints: ServerEndpoints, client_id: u8) -> ClientSession {
    let mut settings = settings();
    settings.network.server_address = "127.0.0.1".into();
    settings.network.scene_port = endpoints.scene.port();
    settings.network.update_port = endpoints.update.port();
    settings.network.collect_port = endpoints.collect.port();
    let core = Core::new(
        settings,
        NetworkIdentity {
            client_id,
            is_server: false,
        },
    );
    ClientSession::connect_tcp(core).await.unwrap()
}

/// Ticks `session` until `condition` holds.
async fn tick_until(session: &ClientSession, mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            session.tick();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition never held");
}

#[tokio::test]
async fn edits_reach_other_clients_through_the_relay() {
    let server = start_server().await;
    assert_eq!(server.modules().collect::<Vec<_>>(), ModuleKind::SERVER);
    let endpoints = server.endpoints().unwrap();

    let a = join(endpoints, 1).await;
    let b = join(endpoints, 2).await;
    assert_eq!(b.core().scene().registry().unwrap().len(), 2);

    let intensity = ParameterValue::Float(7.5);
    a.core()
        .scene()
        .object(2)
        .unwrap()
        .parameter(param_ids::LIGHT_INTENSITY)
        .unwrap()
        .set(intensity.clone(), ChangeOrigin::Local)
        .unwrap();

    let remote = b
        .core()
        .scene()
        .object(2)
        .unwrap()
        .parameter(param_ids::LIGHT_INTENSITY)
        .unwrap()
        .clone();
    tick_until(&b, || remote.value() == intensity).await;

    a.shutdown().await;
    b.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn late_joiner_sees_cached_lock() {
    let server = start_server().await;
    let endpoints = server.endpoints().unwrap();

    let a = join(endpoints, 1).await;
    a.lock_object(1, true).unwrap();
    let cache = server.cache().clone();
    tick_until(&a, || !cache.is_empty()).await;

    let c = join(endpoints, 3).await;
    let chair = c.core().scene().object(1).unwrap();
    tick_until(&c, || chair.is_locked()).await;

    a.shutdown().await;
    c.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn clients_notice_a_stopped_server() {
    let server = start_server().await;
    let a = join(server.endpoints().unwrap(), 1).await;
    let mut state = a.receiver().watch_state();
    tokio::time::timeout(WAIT, state.wait_for(|s| *s == ModuleState::Listening))
        .await
        .unwrap()
        .unwrap();

    server.shutdown().await;
    tokio::time::timeout(WAIT, state.wait_for(|s| *s == ModuleState::Disconnected))
        .await
        .unwrap()
        .unwrap();
    a.shutdown().await;
}
