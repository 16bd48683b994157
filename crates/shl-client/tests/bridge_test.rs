// End-to-end scenarios against a scripted mock bridge.

mod support;

use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;

use shl_client::{Bridge, BridgeState, Error, HeatingMode, LightState, RctState};

use support::{inventory, MockBridge, AUTH_KEY, CONNECTION_ID, DEVICE_ID};

const WAIT: Duration = Duration::from_secs(5);

async fn start(server: &MockBridge) -> (Bridge, tokio::task::JoinHandle<Result<(), Error>>) {
    let bridge = Bridge::new(server.config());
    let runner = {
        let bridge = bridge.clone();
        tokio::spawn(async move { bridge.run().await })
    };
    (bridge, runner)
}

async fn shutdown(bridge: Bridge, runner: tokio::task::JoinHandle<Result<(), Error>>) {
    bridge.close().await;
    timeout(WAIT, runner).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn handshake_frames_in_order_with_counter_discipline() {
    let server = MockBridge::bind().await;
    let (bridge, runner) = start(&server).await;
    let mut session = server.accept().await;

    let seen = session.serve_handshake().await;

    let types: Vec<i32> = seen.iter().map(|e| e.type_int).collect();
    assert_eq!(types, vec![11, 14, 16, 30, 33, 37, 33]);
    // Handshake frames never touch the counter.
    assert!(seen.iter().all(|e| e.mc == Some(-1)));

    let hello = seen[0].payload();
    assert_eq!(hello["client_type"], "shl-app");
    assert_eq!(hello["client_id"], "c956e43f999f8004");
    assert_eq!(hello["client_version"], "3.0.0");
    assert_eq!(hello["connection_id"], CONNECTION_ID);

    let login = seen[3].payload();
    assert_eq!(login["username"], "default");
    let salt = login["salt"].as_str().unwrap();
    assert_eq!(salt.len(), 12);
    assert!(salt.chars().all(|c| c.is_ascii_alphanumeric()));
    let expected = shl_proto::password_hash(DEVICE_ID, AUTH_KEY, salt);
    assert_eq!(login["password"], expected.as_str());

    assert_eq!(seen[4].payload()["token"], "T1");
    assert_eq!(seen[5].payload()["token"], "T1");
    assert_eq!(seen[6].payload()["token"], "T2");

    // Priming frames are the first numbered ones, counting from 1.
    let priming = session.drain_priming().await;
    let numbered: Vec<(i32, Option<i64>)> = priming.iter().map(|e| (e.type_int, e.mc)).collect();
    assert_eq!(numbered, vec![(240, Some(1)), (242, Some(2)), (2, Some(3))]);
    for frame in &priming {
        assert!(frame.payload().as_object().is_some_and(|o| o.is_empty()));
    }

    shutdown(bridge, runner).await;
}

#[tokio::test]
async fn catalogue_materialises_and_projects_state() {
    let server = MockBridge::bind().await;
    let (bridge, runner) = start(&server).await;
    let mut session = server.accept().await;
    session.serve_to_ready().await;

    session
        .send(json!({"type_int": 172, "mc": 1, "payload": inventory(true)}))
        .await;
    let ack = session.recv().await;
    assert_eq!(ack.type_int, 1);
    assert_eq!(ack.ack_ref, Some(1));

    let devices = timeout(WAIT, bridge.devices()).await.unwrap();
    assert_eq!(devices.len(), 2);

    let light = devices[&7].as_light().unwrap();
    assert_eq!(light.name(), "Kitchen");
    assert_eq!(light.state(), Some(LightState { switch: true, dimm_value: 50 }));
    assert!(devices[&8].as_shade().is_some());

    let rooms = bridge.rooms().await;
    let room = &rooms[&3];
    let state = room.state().unwrap();
    assert_eq!(state.mode, HeatingMode::Comfort);
    assert_eq!(state.setpoint, Some(22.0));
    assert_eq!(state.temperature, Some(21.4));
    assert_eq!(state.rct_state, RctState::Idle);
    assert_eq!(room.setpoint_for(HeatingMode::Comfort), Some(22.0));

    // A later device-state push reaches an existing subscription, with
    // the brightness retained across the off frame.
    let mut states = light.subscribe();
    assert_eq!(states.current(), Some(&LightState { switch: true, dimm_value: 50 }));
    session
        .send(json!({"type_int": 170, "mc": 2, "payload": {"deviceId": 7, "switch": false}}))
        .await;
    assert_eq!(session.recv().await.ack_ref, Some(2));
    let next = timeout(WAIT, states.changed()).await.unwrap().unwrap();
    assert_eq!(next, LightState { switch: false, dimm_value: 50 });

    shutdown(bridge, runner).await;
}

#[tokio::test]
async fn commands_clamp_and_number_frames() {
    let server = MockBridge::bind().await;
    let (bridge, runner) = start(&server).await;
    let mut session = server.accept().await;
    session.serve_to_ready().await;

    session
        .send(json!({"type_int": 172, "mc": 1, "payload": inventory(true)}))
        .await;
    assert_eq!(session.recv().await.ack_ref, Some(1));

    let devices = timeout(WAIT, bridge.devices()).await.unwrap();
    let light = devices[&7].as_light().unwrap();
    let shade = devices[&8].as_shade().unwrap();

    // Priming took mc 1-3; commands continue from there. Out-of-range
    // brightness is clamped before it reaches the wire.
    light.dim(200).await.unwrap();
    let frame = session.recv().await;
    assert_eq!(frame.type_int, 61);
    assert_eq!(frame.mc, Some(4));
    assert_eq!(frame.payload()["deviceId"], 7);
    assert_eq!(frame.payload()["dimmvalue"], 99);

    light.dim(-5).await.unwrap();
    let frame = session.recv().await;
    assert_eq!(frame.mc, Some(5));
    assert_eq!(frame.payload()["dimmvalue"], 0);

    light.switch(true).await.unwrap();
    let frame = session.recv().await;
    assert_eq!(frame.type_int, 60);
    assert_eq!(frame.mc, Some(6));
    assert_eq!(frame.payload()["switch"], true);

    for (command, state) in [
        (shade.move_down().await, 1),
        (shade.stop().await, 2),
        (shade.move_up().await, 3),
    ] {
        command.unwrap();
        let frame = session.recv().await;
        assert_eq!(frame.type_int, 110);
        assert_eq!(frame.payload()["deviceId"], 8);
        assert_eq!(frame.payload()["state"], state);
    }

    shutdown(bridge, runner).await;
}

#[tokio::test]
async fn setpoint_is_clamped_to_the_active_mode_on_the_wire() {
    let server = MockBridge::bind().await;
    let (bridge, runner) = start(&server).await;
    let mut session = server.accept().await;
    session.serve_to_ready().await;

    session
        .send(json!({"type_int": 172, "mc": 1, "payload": {
            "rooms": [{"roomId": 3, "name": "Cellar", "currentMode": 1, "state": 0}],
            "lastItem": true,
        }}))
        .await;
    assert_eq!(session.recv().await.ack_ref, Some(1));

    let rooms = timeout(WAIT, bridge.rooms()).await.unwrap();
    let room = std::sync::Arc::clone(&rooms[&3]);

    // Cool mode admits [5, 20]; 30 is clamped down and remembered.
    room.set_target_temperature(30.0).await.unwrap();
    let frame = session.recv().await;
    assert_eq!(frame.type_int, 113);
    assert_eq!(frame.payload()["roomId"], 3);
    assert_eq!(frame.payload()["mode"], 1);
    assert_eq!(frame.payload()["state"], 0);
    assert_eq!(frame.payload()["setpoint"], 20.0);
    assert_eq!(frame.payload()["confirmed"], false);
    assert_eq!(room.setpoint_for(HeatingMode::Cool), Some(20.0));

    // Switching to a mode with no remembered setpoint falls back to 20.
    room.set_mode(HeatingMode::Comfort).await.unwrap();
    let frame = session.recv().await;
    assert_eq!(frame.payload()["mode"], 3);
    assert_eq!(frame.payload()["setpoint"], 20.0);

    shutdown(bridge, runner).await;
}

#[tokio::test]
async fn initialization_waits_for_the_last_item_marker() {
    let server = MockBridge::bind().await;
    let (bridge, runner) = start(&server).await;
    let mut session = server.accept().await;
    session.serve_to_ready().await;

    // Inventory without the marker: the catalogue fills but the bridge
    // is not ready yet.
    session
        .send(json!({"type_int": 172, "mc": 1, "payload": inventory(false)}))
        .await;
    assert_eq!(session.recv().await.ack_ref, Some(1));
    assert!(timeout(Duration::from_millis(200), bridge.devices()).await.is_err());
    assert!(bridge.device(7).is_some());
    assert_eq!(*bridge.state().borrow(), BridgeState::Initializing);

    session
        .send(json!({"type_int": 172, "mc": 2, "payload": {"lastItem": true}}))
        .await;
    assert_eq!(session.recv().await.ack_ref, Some(2));
    let devices = timeout(WAIT, bridge.devices()).await.unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(*bridge.state().borrow(), BridgeState::Ready);

    shutdown(bridge, runner).await;
}

#[tokio::test]
async fn unknown_message_types_are_acked_and_survive() {
    let server = MockBridge::bind().await;
    let (bridge, runner) = start(&server).await;
    let mut session = server.accept().await;
    session.serve_to_ready().await;

    session
        .send(json!({"type_int": 172, "mc": 1, "payload": inventory(true)}))
        .await;
    assert_eq!(session.recv().await.ack_ref, Some(1));
    let devices = timeout(WAIT, bridge.devices()).await.unwrap();

    // A frame outside the catalogue is acked, logged, and ignored.
    session
        .send(json!({"type_int": 9999, "mc": 2, "payload": {"x": 1}}))
        .await;
    assert_eq!(session.recv().await.ack_ref, Some(2));

    // The session is still alive afterwards.
    let light = devices[&7].as_light().unwrap();
    light.switch(false).await.unwrap();
    assert_eq!(session.recv().await.type_int, 60);

    shutdown(bridge, runner).await;
}

#[tokio::test]
async fn second_run_fails_while_the_first_is_active() {
    let server = MockBridge::bind().await;
    let (bridge, runner) = start(&server).await;
    let mut session = server.accept().await;
    session.serve_to_ready().await;

    match bridge.run().await {
        Err(Error::InvalidRunState { state }) => assert_eq!(state, BridgeState::Initializing),
        other => panic!("expected InvalidRunState, got {other:?}"),
    }

    shutdown(bridge, runner).await;
}

#[tokio::test]
async fn reconnect_retains_entities_and_refreshes_state() {
    let server = MockBridge::bind().await;
    let (bridge, runner) = start(&server).await;

    let mut session = server.accept().await;
    session.serve_to_ready().await;
    session
        .send(json!({"type_int": 172, "mc": 1, "payload": inventory(true)}))
        .await;
    assert_eq!(session.recv().await.ack_ref, Some(1));

    let devices = timeout(WAIT, bridge.devices()).await.unwrap();
    let light = devices[&7].as_light().unwrap();
    let mut states = light.subscribe();
    assert_eq!(states.current(), Some(&LightState { switch: true, dimm_value: 50 }));

    // Kill the connection server-side; the supervisor reconnects after
    // its delay and the second session starts a fresh counter.
    drop(session);
    let mut session = timeout(WAIT, server.accept()).await.unwrap();
    session.serve_to_ready().await;

    let mut refreshed = inventory(true);
    refreshed["devices"][0]["dimmvalue"] = json!(30);
    session
        .send(json!({"type_int": 172, "mc": 1, "payload": refreshed}))
        .await;
    assert_eq!(session.recv().await.ack_ref, Some(1));

    // Same entity, same subscription, refreshed state -- and the bridge
    // never left Ready.
    let next = timeout(WAIT, states.changed()).await.unwrap().unwrap();
    assert_eq!(next, LightState { switch: true, dimm_value: 30 });
    let same = bridge.device(7).unwrap().as_light().unwrap();
    assert!(std::sync::Arc::ptr_eq(&light, &same));
    assert_eq!(*bridge.state().borrow(), BridgeState::Ready);

    shutdown(bridge, runner).await;
}

#[tokio::test]
async fn rejection_is_logged_and_retried() {
    let server = MockBridge::bind().await;
    let (bridge, runner) = start(&server).await;

    // First attempt: refused outright.
    let mut session = server.accept().await;
    session
        .send(json!({"type_int": 3, "payload": {"info": "bridge busy"}}))
        .await;
    drop(session);

    // Second attempt: full handshake, catalogue, ready.
    let mut session = timeout(WAIT, server.accept()).await.unwrap();
    session.serve_to_ready().await;
    session
        .send(json!({"type_int": 172, "mc": 1, "payload": inventory(true)}))
        .await;
    assert_eq!(session.recv().await.ack_ref, Some(1));
    assert_eq!(timeout(WAIT, bridge.devices()).await.unwrap().len(), 2);

    shutdown(bridge, runner).await;
}
