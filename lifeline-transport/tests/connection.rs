//! Integration tests for the connection lifecycle over a scripted transport.
//!
//! Time is tokio's paused clock: connect timers fire only when a test
//! advances it, so every retry scenario is deterministic.

#[path = "connection/support.rs"]
mod support;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::LocalSet;

use lifeline_transport::{
    Connection, ConnectionConfig, ConnectionError, ConnectionState, JsonCodec, MessageCodec,
};

use support::{
    CountingCodec, DeliveryLog, GatedCodec, ScriptedProviders, ScriptedTransport, StateLog,
    TestMsg, paused_runtime, settle,
};

fn build_with<C: MessageCodec>(
    codec: C,
    uris: &[&str],
    config: ConnectionConfig,
) -> (
    Connection<ScriptedProviders, C, TestMsg>,
    ScriptedTransport,
    StateLog,
    DeliveryLog,
) {
    let providers = ScriptedProviders::default();
    let transport = providers.transport.clone();
    let states: StateLog = Rc::new(RefCell::new(Vec::new()));
    let delivered: DeliveryLog = Rc::new(RefCell::new(Vec::new()));

    let states_sink = states.clone();
    let delivered_sink = delivered.clone();
    let conn = Connection::new(
        providers,
        codec,
        uris.iter().map(|u| u.to_string()).collect(),
        config,
        move |change| states_sink.borrow_mut().push(change),
        move |msg| delivered_sink.borrow_mut().push(msg),
    )
    .expect("connection construction");

    (conn, transport, states, delivered)
}

fn state_sequence(states: &StateLog) -> Vec<ConnectionState> {
    states.borrow().iter().map(|change| change.state).collect()
}

/// Advance the paused clock in fixed steps until the connection reaches
/// `target`, panicking if it never does.
async fn advance_until_state(states: &StateLog, target: ConnectionState, step: Duration) {
    for _ in 0..64 {
        settle().await;
        if states.borrow().last().map(|change| change.state) == Some(target) {
            return;
        }
        tokio::time::advance(step).await;
    }
    panic!("never reached {target:?}, saw {:?}", state_sequence(states));
}

#[test]
fn test_connects_and_reports_state_changes() {
    let rt = paused_runtime();
    LocalSet::new().block_on(&rt, async {
        let (conn, transport, states, _) =
            build_with(JsonCodec, &["ws://a"], ConnectionConfig::remote());

        settle().await;
        assert_eq!(state_sequence(&states), [ConnectionState::InitialConnecting]);
        assert!(!conn.is_connected());

        transport.with_last(|ctl| ctl.open());
        settle().await;

        assert_eq!(
            state_sequence(&states),
            [
                ConnectionState::InitialConnecting,
                ConnectionState::Connected
            ]
        );
        assert!(conn.is_connected());
    });
}

#[test]
fn test_delivery_follows_arrival_order_not_decode_order() {
    let rt = paused_runtime();
    LocalSet::new().block_on(&rt, async {
        let codec = GatedCodec::default();
        let (_conn, transport, _, delivered) =
            build_with(codec.clone(), &["ws://a"], ConnectionConfig::remote());

        settle().await;
        transport.with_last(|ctl| ctl.open());
        settle().await;

        // Arrival order 0,1,2; decodes held open by the gates.
        transport.with_last(|ctl| {
            for n in 0..3u64 {
                ctl.deliver(&serde_json::to_vec(&TestMsg { n }).expect("encode"));
            }
        });
        settle().await;
        assert!(delivered.borrow().is_empty());

        // Completion order 2,0,1; delivery must stay 0,1,2.
        codec.release(2);
        settle().await;
        assert!(delivered.borrow().is_empty(), "head of line must block");

        codec.release(0);
        settle().await;
        assert_eq!(*delivered.borrow(), [TestMsg { n: 0 }]);

        codec.release(1);
        settle().await;
        assert_eq!(
            *delivered.borrow(),
            [TestMsg { n: 0 }, TestMsg { n: 1 }, TestMsg { n: 2 }]
        );
    });
}

#[test]
fn test_undecodable_payload_is_skipped_without_stalling() {
    let rt = paused_runtime();
    LocalSet::new().block_on(&rt, async {
        let (_conn, transport, _, delivered) =
            build_with(JsonCodec, &["ws://a"], ConnectionConfig::remote());

        settle().await;
        transport.with_last(|ctl| ctl.open());
        settle().await;

        transport.with_last(|ctl| {
            ctl.deliver(b"not valid json {");
            ctl.deliver(&serde_json::to_vec(&TestMsg { n: 5 }).expect("encode"));
        });
        settle().await;

        // The bad payload is dropped; the one behind it still flows.
        assert_eq!(*delivered.borrow(), [TestMsg { n: 5 }]);
    });
}

#[test]
fn test_remote_exhaustion_walks_every_sweep() {
    let rt = paused_runtime();
    LocalSet::new().block_on(&rt, async {
        let (conn, transport, states, _) = build_with(
            JsonCodec,
            &["ws://a", "ws://b"],
            ConnectionConfig::remote(),
        );

        advance_until_state(&states, ConnectionState::Error, Duration::from_secs(2)).await;

        assert_eq!(
            transport.opened_uris(),
            ["ws://a", "ws://b", "ws://a", "ws://b", "ws://a", "ws://b"]
        );
        let states = states.borrow();
        let terminal = states.last().expect("terminal state");
        assert_eq!(terminal.err_msg.as_deref(), Some("Retries exhausted"));
        assert_eq!(conn.state(), ConnectionState::Error);
    });
}

#[test]
fn test_local_connection_keeps_retrying() {
    let rt = paused_runtime();
    LocalSet::new().block_on(&rt, async {
        let (_conn, transport, states, _) =
            build_with(JsonCodec, &["ws://a"], ConnectionConfig::local());

        for _ in 0..30 {
            settle().await;
            tokio::time::advance(Duration::from_millis(200)).await;
        }
        settle().await;

        assert!(
            transport.opened_uris().len() >= 10,
            "local attempts must keep coming, saw {}",
            transport.opened_uris().len()
        );
        assert!(
            !state_sequence(&states).contains(&ConnectionState::Error),
            "local connections never exhaust retries"
        );
    });
}

#[test]
fn test_mid_session_drop_restarts_sweep_from_first_endpoint() {
    let rt = paused_runtime();
    LocalSet::new().block_on(&rt, async {
        let (_conn, transport, states, _) = build_with(
            JsonCodec,
            &["ws://a", "ws://b"],
            ConnectionConfig::remote(),
        );

        // A fails, B connects.
        settle().await;
        transport.with_last(|ctl| ctl.fail());
        settle().await;
        transport.with_last(|ctl| ctl.open());
        settle().await;

        // The session drops; the fresh sweep starts back at A.
        transport.with_last(|ctl| ctl.remote_close());
        settle().await;

        assert_eq!(transport.opened_uris(), ["ws://a", "ws://b", "ws://a"]);
        assert_eq!(
            state_sequence(&states),
            [
                ConnectionState::InitialConnecting,
                ConnectionState::Disconnected,
                ConnectionState::Reconnecting,
                ConnectionState::Connected,
                ConnectionState::Disconnected,
                ConnectionState::Reconnecting,
            ]
        );
    });
}

#[test]
fn test_send_message_writes_encoded_payload() {
    let rt = paused_runtime();
    LocalSet::new().block_on(&rt, async {
        let (conn, transport, _, _) =
            build_with(JsonCodec, &["ws://a"], ConnectionConfig::remote());

        settle().await;
        transport.with_last(|ctl| ctl.open());
        settle().await;

        conn.send_message(&TestMsg { n: 9 }).expect("send");

        let expected = serde_json::to_vec(&TestMsg { n: 9 }).expect("encode");
        transport.with_last(|ctl| {
            assert_eq!(*ctl.sent.borrow(), [expected]);
        });
    });
}

#[test]
fn test_send_after_exhaustion_never_invokes_codec() {
    let rt = paused_runtime();
    LocalSet::new().block_on(&rt, async {
        let codec = CountingCodec::default();
        let (conn, _, states, _) =
            build_with(codec.clone(), &["ws://a"], ConnectionConfig::remote());

        advance_until_state(&states, ConnectionState::Error, Duration::from_secs(2)).await;

        conn.send_message(&TestMsg { n: 1 }).expect("silent drop");
        assert_eq!(codec.encodes.get(), 0, "no live transport, no encode");
    });
}

#[test]
fn test_static_mode_reports_once_and_drops_sends() {
    let rt = paused_runtime();
    LocalSet::new().block_on(&rt, async {
        let codec = CountingCodec::default();
        let states: StateLog = Rc::new(RefCell::new(Vec::new()));
        let states_sink = states.clone();
        let conn: Connection<ScriptedProviders, CountingCodec, TestMsg> =
            Connection::new_static(codec.clone(), move |change| {
                states_sink.borrow_mut().push(change)
            });

        assert_eq!(state_sequence(&states), [ConnectionState::Static]);
        assert_eq!(conn.state(), ConnectionState::Static);
        assert!(!conn.is_connected());

        conn.send_message(&TestMsg { n: 3 }).expect("silent drop");
        assert_eq!(codec.encodes.get(), 0);
        assert_eq!(state_sequence(&states), [ConnectionState::Static]);
    });
}

#[test]
fn test_empty_endpoint_list_is_rejected() {
    let rt = paused_runtime();
    LocalSet::new().block_on(&rt, async {
        let result = Connection::<ScriptedProviders, JsonCodec, TestMsg>::new(
            ScriptedProviders::default(),
            JsonCodec,
            Vec::new(),
            ConnectionConfig::remote(),
            |_| {},
            |_| {},
        );
        assert!(matches!(result, Err(ConnectionError::EmptyEndpointList)));
    });
}

#[test]
fn test_close_tears_down_live_socket() {
    let rt = paused_runtime();
    LocalSet::new().block_on(&rt, async {
        let (mut conn, transport, _, _) =
            build_with(JsonCodec, &["ws://a"], ConnectionConfig::remote());

        settle().await;
        transport.with_last(|ctl| ctl.open());
        settle().await;
        assert!(conn.is_connected());

        conn.close().await;

        transport.with_last(|ctl| assert!(ctl.closed.get()));
    });
}
