//! Framed TCP implementation of the transport socket contract.
//!
//! Each opened socket is backed by one local task that owns the TCP stream:
//! it performs the connect, reports lifecycle events, writes outbound
//! frames, and splits the inbound byte stream back into whole payloads with
//! the [`crate::wire`] framing. The [`TcpSocket`] handle only flips phase
//! and feeds the task through a command channel, so it stays cheap to hold
//! behind the connection's live-transport reference.

use std::cell::Cell;
use std::rc::Rc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use lifeline_core::{
    Providers, SocketEvent, SocketEvents, SocketPhase, TaskProvider, TokioTaskProvider,
    TokioTimeProvider, TransportProvider, TransportSocket,
};

use crate::wire::{encode_frame, try_decode_frame};

const READ_CHUNK_SIZE: usize = 8 * 1024;

enum WriterCmd {
    Frame(Vec<u8>),
    Shutdown,
}

/// Handle to one framed TCP socket.
pub struct TcpSocket {
    phase: Rc<Cell<SocketPhase>>,
    cmd_tx: mpsc::UnboundedSender<WriterCmd>,
}

impl TransportSocket for TcpSocket {
    fn phase(&self) -> SocketPhase {
        self.phase.get()
    }

    fn send(&mut self, payload: Vec<u8>) {
        // A send after the socket task exited surfaces as Errored/Closed on
        // the event stream, never here.
        let _ = self.cmd_tx.send(WriterCmd::Frame(payload));
    }

    fn close(&mut self) {
        self.phase.set(SocketPhase::Closed);
        let _ = self.cmd_tx.send(WriterCmd::Shutdown);
    }
}

/// Transport provider producing framed TCP sockets.
///
/// URIs are `host:port` address strings. Requires a `LocalSet` context: the
/// per-socket IO task is spawned with `spawn_local` semantics.
#[derive(Clone, Default)]
pub struct TcpTransportProvider {
    task: TokioTaskProvider,
}

impl TcpTransportProvider {
    /// Create a TCP transport provider.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransportProvider for TcpTransportProvider {
    type Socket = TcpSocket;

    fn open(&self, uri: &str) -> (TcpSocket, SocketEvents) {
        let phase = Rc::new(Cell::new(SocketPhase::Connecting));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        self.task.spawn_task(
            "tcp_socket",
            socket_task(uri.to_string(), phase.clone(), cmd_rx, events_tx),
        );

        (TcpSocket { phase, cmd_tx }, events_rx)
    }
}

/// Owns the TCP stream for one socket, from connect to terminal event.
async fn socket_task(
    uri: String,
    phase: Rc<Cell<SocketPhase>>,
    mut cmd_rx: mpsc::UnboundedReceiver<WriterCmd>,
    events_tx: mpsc::UnboundedSender<SocketEvent>,
) {
    let mut stream = match TcpStream::connect(&uri).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::debug!(%uri, error = %e, "tcp connect failed");
            phase.set(SocketPhase::Closed);
            let _ = events_tx.send(SocketEvent::Errored);
            return;
        }
    };

    // The handle may have been closed while the connect was in flight.
    if phase.get() == SocketPhase::Closed {
        return;
    }
    phase.set(SocketPhase::Open);
    let _ = events_tx.send(SocketEvent::Opened);

    let (mut reader, mut writer) = stream.split();
    let mut inbound: Vec<u8> = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    // Past this point every failure reports Closed: once Opened has fired,
    // the one permitted terminal event is a close, and the connection layer
    // handles it with a fresh attempt sweep. Errored is connect-phase only.

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(WriterCmd::Frame(payload)) => {
                    let frame = match encode_frame(&payload) {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::error!(error = %e, "dropping unframeable outbound payload");
                            continue;
                        }
                    };
                    if let Err(e) = writer.write_all(&frame).await {
                        tracing::warn!(%uri, error = %e, "tcp write failed");
                        phase.set(SocketPhase::Closed);
                        let _ = events_tx.send(SocketEvent::Closed);
                        return;
                    }
                }
                // A dropped handle counts as a close.
                Some(WriterCmd::Shutdown) | None => {
                    let _ = writer.shutdown().await;
                    phase.set(SocketPhase::Closed);
                    let _ = events_tx.send(SocketEvent::Closed);
                    return;
                }
            },
            read = reader.read(&mut chunk) => match read {
                Ok(0) => {
                    tracing::debug!(%uri, "tcp connection closed by peer");
                    phase.set(SocketPhase::Closed);
                    let _ = events_tx.send(SocketEvent::Closed);
                    return;
                }
                Ok(n) => {
                    inbound.extend_from_slice(&chunk[..n]);
                    loop {
                        match try_decode_frame(&inbound) {
                            Ok(Some((payload, consumed))) => {
                                inbound.drain(..consumed);
                                let _ = events_tx.send(SocketEvent::Message(payload));
                            }
                            Ok(None) => break,
                            Err(e) => {
                                tracing::error!(%uri, error = %e, "malformed inbound frame");
                                phase.set(SocketPhase::Closed);
                                let _ = events_tx.send(SocketEvent::Closed);
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(%uri, error = %e, "tcp read failed");
                    phase.set(SocketPhase::Closed);
                    let _ = events_tx.send(SocketEvent::Closed);
                    return;
                }
            },
        }
    }
}

/// Production provider bundle over framed TCP with real tokio time.
#[derive(Clone, Default)]
pub struct TcpProviders {
    transport: TcpTransportProvider,
    time: TokioTimeProvider,
    task: TokioTaskProvider,
}

impl TcpProviders {
    /// Create a production provider bundle.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Providers for TcpProviders {
    type Transport = TcpTransportProvider;
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
