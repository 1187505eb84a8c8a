//! Duplex message socket abstraction.
//!
//! The connection layer does not implement its own transport. It rides a
//! host-provided full-duplex message socket: [`TransportProvider::open`]
//! starts connecting to one URI and returns a handle immediately, together
//! with a stream of lifecycle and payload events. The handle is in the
//! [`SocketPhase::Connecting`] phase until an [`SocketEvent::Opened`] event
//! fires.
//!
//! A socket fires at most one terminal event per lifecycle: either `Opened`
//! followed eventually by `Closed`, or `Closed`/`Errored` directly when the
//! connection never establishes. `Errored` never fires after `Opened`; a
//! session that fails mid-stream ends with `Closed`.

use tokio::sync::mpsc;

/// Readiness phase of a transport socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketPhase {
    /// The socket is still establishing; no terminal event has fired yet.
    Connecting,
    /// The socket is open and can carry payloads in both directions.
    Open,
    /// The socket is closed; no further sends will be delivered.
    Closed,
}

/// Lifecycle and payload events emitted by a transport socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// The connection was established.
    Opened,
    /// A complete inbound payload arrived.
    Message(Vec<u8>),
    /// The connection closed, either remotely or after a local close.
    /// The only terminal event permitted after `Opened`.
    Closed,
    /// The connection attempt failed before establishing.
    Errored,
}

/// Receiving half of a socket's event stream.
pub type SocketEvents = mpsc::UnboundedReceiver<SocketEvent>;

/// Handle to one duplex message socket.
///
/// Single-threaded design; implementations are free to use `Rc` internally
/// and are never sent across threads.
pub trait TransportSocket: 'static {
    /// Current readiness phase, observable without consuming events.
    fn phase(&self) -> SocketPhase;

    /// Queue one payload for transmission.
    ///
    /// Write failures are not reported here; they surface as a
    /// [`SocketEvent::Errored`] event on the socket's event stream.
    fn send(&mut self, payload: Vec<u8>);

    /// Close the socket. Idempotent.
    fn close(&mut self);
}

/// Factory for transport sockets.
pub trait TransportProvider: Clone + 'static {
    /// The socket handle type produced by this provider.
    type Socket: TransportSocket;

    /// Begin connecting to `uri`.
    ///
    /// Returns immediately with a handle in the `Connecting` phase and the
    /// event stream for this socket's lifecycle.
    fn open(&self, uri: &str) -> (Self::Socket, SocketEvents);
}
