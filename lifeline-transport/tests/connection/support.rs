//! Scripted providers and codecs for connection integration tests.
//!
//! The scripted transport hands every opened socket back to the test as a
//! controller, so the test script decides when a connect succeeds, fails,
//! or drops mid-session. Time runs on tokio's paused clock; tests advance
//! it explicitly to fire connect timers.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, mpsc};

use lifeline_transport::{
    CodecError, MessageCodec, Providers, SocketEvent, SocketEvents, SocketPhase, StateChange,
    TokioTaskProvider, TokioTimeProvider, TransportProvider, TransportSocket,
};

/// Paused-clock current-thread runtime. Timers only fire when the test
/// advances the clock.
pub fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("Failed to build runtime")
}

/// Let every ready task run without advancing the paused clock.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Message type used across the integration tests.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TestMsg {
    pub n: u64,
}

/// Shared recorder for state-change notifications.
pub type StateLog = Rc<RefCell<Vec<StateChange>>>;

/// Shared recorder for delivered messages.
pub type DeliveryLog = Rc<RefCell<Vec<TestMsg>>>;

// =============================================================================
// Scripted transport
// =============================================================================

/// Test-side controller for one opened socket.
pub struct SocketCtl {
    pub uri: String,
    pub phase: Rc<Cell<SocketPhase>>,
    pub closed: Rc<Cell<bool>>,
    pub sent: Rc<RefCell<Vec<Vec<u8>>>>,
    events: mpsc::UnboundedSender<SocketEvent>,
}

impl SocketCtl {
    /// Resolve the connect attempt successfully.
    pub fn open(&self) {
        self.phase.set(SocketPhase::Open);
        let _ = self.events.send(SocketEvent::Opened);
    }

    /// Fail the socket with an error event.
    pub fn fail(&self) {
        self.phase.set(SocketPhase::Closed);
        let _ = self.events.send(SocketEvent::Errored);
    }

    /// Close the socket from the remote side.
    pub fn remote_close(&self) {
        self.phase.set(SocketPhase::Closed);
        let _ = self.events.send(SocketEvent::Closed);
    }

    /// Deliver one inbound payload.
    pub fn deliver(&self, payload: &[u8]) {
        let _ = self.events.send(SocketEvent::Message(payload.to_vec()));
    }
}

pub struct ScriptedSocket {
    phase: Rc<Cell<SocketPhase>>,
    closed: Rc<Cell<bool>>,
    sent: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl TransportSocket for ScriptedSocket {
    fn phase(&self) -> SocketPhase {
        self.phase.get()
    }

    fn send(&mut self, payload: Vec<u8>) {
        self.sent.borrow_mut().push(payload);
    }

    fn close(&mut self) {
        self.closed.set(true);
        self.phase.set(SocketPhase::Closed);
    }
}

/// Transport whose sockets are driven by the test through [`SocketCtl`].
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    pub sockets: Rc<RefCell<Vec<SocketCtl>>>,
}

impl ScriptedTransport {
    /// URIs of every socket opened so far, in order.
    pub fn opened_uris(&self) -> Vec<String> {
        self.sockets
            .borrow()
            .iter()
            .map(|ctl| ctl.uri.clone())
            .collect()
    }

    /// Run `f` against the controller of the most recently opened socket.
    pub fn with_last<R>(&self, f: impl FnOnce(&SocketCtl) -> R) -> R {
        let sockets = self.sockets.borrow();
        let last = sockets.last().expect("no socket opened yet");
        f(last)
    }
}

impl TransportProvider for ScriptedTransport {
    type Socket = ScriptedSocket;

    fn open(&self, uri: &str) -> (ScriptedSocket, SocketEvents) {
        let phase = Rc::new(Cell::new(SocketPhase::Connecting));
        let closed = Rc::new(Cell::new(false));
        let sent = Rc::new(RefCell::new(Vec::new()));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        self.sockets.borrow_mut().push(SocketCtl {
            uri: uri.to_string(),
            phase: phase.clone(),
            closed: closed.clone(),
            sent: sent.clone(),
            events: events_tx,
        });

        (
            ScriptedSocket {
                phase,
                closed,
                sent,
            },
            events_rx,
        )
    }
}

/// Provider bundle over the scripted transport and tokio's paused clock.
#[derive(Clone, Default)]
pub struct ScriptedProviders {
    pub transport: ScriptedTransport,
    time: TokioTimeProvider,
    task: TokioTaskProvider,
}

impl Providers for ScriptedProviders {
    type Transport = ScriptedTransport;
    type Time = TokioTimeProvider;
    type Task = TokioTaskProvider;

    fn transport(&self) -> &Self::Transport {
        &self.transport
    }

    fn time(&self) -> &Self::Time {
        &self.time
    }

    fn task(&self) -> &Self::Task {
        &self.task
    }
}

// =============================================================================
// Codecs
// =============================================================================

/// JSON codec whose decode suspends until the test releases a per-message
/// gate, keyed on the message's `n` field. Lets a test force decode
/// completions to finish out of arrival order.
#[derive(Clone, Default)]
pub struct GatedCodec {
    gates: Rc<RefCell<HashMap<u64, Rc<Notify>>>>,
}

impl GatedCodec {
    fn gate(&self, n: u64) -> Rc<Notify> {
        self.gates
            .borrow_mut()
            .entry(n)
            .or_insert_with(|| Rc::new(Notify::new()))
            .clone()
    }

    /// Let the decode of message `n` complete.
    pub fn release(&self, n: u64) {
        self.gate(n).notify_one();
    }
}

#[async_trait(?Send)]
impl MessageCodec for GatedCodec {
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(msg).map_err(|e| CodecError::Encode(Box::new(e)))
    }

    async fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError> {
        let value: serde_json::Value =
            serde_json::from_slice(buf).map_err(|e| CodecError::Decode(Box::new(e)))?;
        if let Some(n) = value.get("n").and_then(serde_json::Value::as_u64) {
            self.gate(n).notified().await;
        }
        serde_json::from_slice(buf).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}

/// JSON codec that counts invocations, for zero-encode assertions.
#[derive(Clone, Default)]
pub struct CountingCodec {
    pub encodes: Rc<Cell<usize>>,
    pub decodes: Rc<Cell<usize>>,
}

#[async_trait(?Send)]
impl MessageCodec for CountingCodec {
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError> {
        self.encodes.set(self.encodes.get() + 1);
        serde_json::to_vec(msg).map_err(|e| CodecError::Encode(Box::new(e)))
    }

    async fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError> {
        self.decodes.set(self.decodes.get() + 1);
        serde_json::from_slice(buf).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}
