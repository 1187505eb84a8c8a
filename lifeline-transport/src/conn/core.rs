//! Connection orchestrator and public handle.
//!
//! The [`Connection`] ties the state machine, retry policy, and ordering
//! buffer together: it opens transport sockets, arms connect timers, routes
//! socket events through the legal-transition table, and reports state
//! changes to the host application.
//!
//! All work runs as discrete turns on one logical event queue: a background
//! driver task selects over socket events, decode completions, the connect
//! timer, and shutdown. Handlers never run concurrently, so the state fields
//! need no synchronization beyond `Rc<RefCell<_>>`.
//!
//! Every attempt increments an integer epoch. Socket events and timer
//! firings carry the epoch of the attempt that armed them; a stale epoch is
//! a no-op, so late events from a superseded socket can never corrupt the
//! attempt that superseded it.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use lifeline_core::{
    CodecError, MessageCodec, Providers, SocketEvent, SocketEvents, SocketPhase, TaskProvider,
    TimeProvider, TransportProvider, TransportSocket,
};

use super::config::ConnectionConfig;
use super::error::ConnectionError;
use super::order::OrderingBuffer;
use super::policy::RetryPolicy;
use super::state::{ConnectionEvent, ConnectionState, StateMachine, StepAction, Transition};

/// Connection state notification delivered to the host application.
///
/// Emitted synchronously inside every successful transition; this is the
/// only channel through which external observers learn of connectivity
/// changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    /// The lifecycle state just entered.
    pub state: ConnectionState,
    /// Human-readable error message, present for terminal errors.
    pub err_msg: Option<String>,
}

type Socket<P> = <<P as Providers>::Transport as TransportProvider>::Socket;

type DecodeResult<M> = (u64, Result<M, CodecError>);

/// State shared between the public handle and the driver task.
struct Shared<P: Providers> {
    state: ConnectionState,
    /// The single authoritative transport handle. Superseded handles are
    /// closed and dropped; their late events are filtered by epoch.
    live: Option<Socket<P>>,
}

/// Resilient client connection to a prioritized list of endpoints.
///
/// Construction immediately starts the first attempt sweep. Inbound
/// messages reach the host strictly in arrival order through the
/// `on_message` callback; connectivity changes arrive through
/// `on_state_change`.
///
/// Requires a `LocalSet` context: the driver and decode tasks are spawned
/// with `spawn_local` semantics through the [`TaskProvider`].
pub struct Connection<P: Providers, C: MessageCodec, M: DeserializeOwned + 'static> {
    shared: Rc<RefCell<Shared<P>>>,
    codec: C,
    driver_handle: Option<JoinHandle<()>>,
    shutdown_tx: mpsc::UnboundedSender<()>,
    _inbound: PhantomData<M>,
}

impl<P, C, M> Connection<P, C, M>
where
    P: Providers,
    C: MessageCodec,
    M: DeserializeOwned + 'static,
{
    /// Create a connection and start the first attempt sweep.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::EmptyEndpointList`] if `uris` is empty.
    pub fn new(
        providers: P,
        codec: C,
        uris: Vec<String>,
        config: ConnectionConfig,
        on_state_change: impl Fn(StateChange) + 'static,
        on_message: impl Fn(M) + 'static,
    ) -> Result<Self, ConnectionError> {
        if uris.is_empty() {
            return Err(ConnectionError::EmptyEndpointList);
        }

        let shared = Rc::new(RefCell::new(Shared {
            state: ConnectionState::Initial,
            live: None,
        }));
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
        let (decode_tx, decode_rx) = mpsc::unbounded_channel();

        let reactor = Reactor {
            providers: providers.clone(),
            codec: codec.clone(),
            uris,
            policy: RetryPolicy::from_config(&config),
            sm: StateMachine::new(),
            order: OrderingBuffer::new(),
            uri_index: 0,
            completed_sweeps: 0,
            epoch: 0,
            deadline: None,
            shared: shared.clone(),
            fresh_events: None,
            decode_tx,
            on_state_change: Box::new(on_state_change),
            on_message: Box::new(on_message),
        };

        let time = providers.time().clone();
        let driver_handle = providers.task().spawn_task(
            "connection_driver",
            drive(reactor, decode_rx, shutdown_rx, time),
        );

        Ok(Self {
            shared,
            codec,
            driver_handle: Some(driver_handle),
            shutdown_tx,
            _inbound: PhantomData,
        })
    }

    /// Create a connection pinned in the connectionless `Static` mode.
    ///
    /// No transport is ever opened and outbound messages are silently
    /// dropped. The `Static` state is reported once, synchronously.
    pub fn new_static(codec: C, on_state_change: impl Fn(StateChange) + 'static) -> Self {
        let shared = Rc::new(RefCell::new(Shared {
            state: ConnectionState::Static,
            live: None,
        }));
        on_state_change(StateChange {
            state: ConnectionState::Static,
            err_msg: None,
        });

        // No driver task; the sender's receiver is dropped immediately.
        let (shutdown_tx, _shutdown_rx) = mpsc::unbounded_channel();
        Self {
            shared,
            codec,
            driver_handle: None,
            shutdown_tx,
            _inbound: PhantomData,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.shared.borrow().state
    }

    /// Whether a transport is open and carrying traffic.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Encode a message and write it to the live transport.
    ///
    /// A no-op when there is no live transport handle: the message is
    /// silently dropped without invoking the codec. No queuing or
    /// backpressure is provided; the boundary layer decides whether to
    /// buffer unsent messages.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if serialization fails.
    pub fn send_message<T: Serialize>(&self, msg: &T) -> Result<(), CodecError> {
        let mut shared = self.shared.borrow_mut();
        let Some(live) = shared.live.as_mut() else {
            tracing::debug!("send_message dropped: no live transport");
            return Ok(());
        };
        let payload = self.codec.encode(msg)?;
        live.send(payload);
        Ok(())
    }

    /// Shut down the driver task and close any live transport.
    pub async fn close(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.driver_handle.take() {
            let _ = handle.await;
        }
        if let Some(mut live) = self.shared.borrow_mut().live.take() {
            live.close();
        }
    }
}

impl<P, C, M> Drop for Connection<P, C, M>
where
    P: Providers,
    C: MessageCodec,
    M: DeserializeOwned + 'static,
{
    fn drop(&mut self) {
        // Stops the driver on the next turn if close() was never awaited.
        let _ = self.shutdown_tx.send(());
    }
}

/// Absolute connect deadline, tagged with the epoch of the attempt that
/// armed it so a timer outliving its attempt fires as a no-op.
#[derive(Debug, Clone, Copy)]
struct ConnectDeadline {
    epoch: u64,
    at: Duration,
}

/// The orchestrator proper: owns the endpoint cursor, sweep counter, epoch,
/// state machine, and ordering buffer. Methods are synchronous; the driver
/// task feeds events in from the async sources.
struct Reactor<P, C, M>
where
    P: Providers,
    C: MessageCodec,
    M: DeserializeOwned + 'static,
{
    providers: P,
    codec: C,
    /// Ordered, immutable list of candidate endpoints.
    uris: Vec<String>,
    policy: RetryPolicy,
    sm: StateMachine,
    order: OrderingBuffer<M>,
    /// Cursor into `uris` for the endpoint currently being attempted.
    uri_index: usize,
    /// Completed full sweeps across the endpoint list. Never reset.
    completed_sweeps: u32,
    /// Incremented on every attempt; tags events with their attempt.
    epoch: u64,
    deadline: Option<ConnectDeadline>,
    shared: Rc<RefCell<Shared<P>>>,
    /// Event stream of the most recently opened socket, for the driver to
    /// pick up after the step that opened it.
    fresh_events: Option<SocketEvents>,
    decode_tx: mpsc::UnboundedSender<DecodeResult<M>>,
    on_state_change: Box<dyn Fn(StateChange)>,
    on_message: Box<dyn Fn(M)>,
}

impl<P, C, M> Reactor<P, C, M>
where
    P: Providers,
    C: MessageCodec,
    M: DeserializeOwned + 'static,
{
    /// Begin a fresh attempt sweep from the first endpoint.
    fn start_sweep(&mut self) -> Result<(), ConnectionError> {
        self.uri_index = 0;
        self.attempt_endpoint()
    }

    /// Consume a connect-failure event, or declare exhaustion instead when
    /// this failure spends the last of the sweep budget.
    ///
    /// Exhaustion must be decided while the machine is still in a
    /// connecting state; once the failure event has been applied the only
    /// legal continuation is another attempt. The exhausting failure is
    /// therefore reported to the host as the terminal `Error` alone, with
    /// no intermediate `Disconnected` notification for that last failure.
    fn fail_attempt(&mut self, event: ConnectionEvent) -> Result<(), ConnectionError> {
        let connecting = matches!(
            self.sm.state(),
            ConnectionState::InitialConnecting | ConnectionState::Reconnecting
        );
        if connecting && self.exhausts_on_advance() {
            self.completed_sweeps += 1;
            // Orphan the failed socket before reporting: its late events
            // must not reach the terminal state.
            self.epoch += 1;
            self.close_live();
            return self.process_event(ConnectionEvent::RetriesExhausted);
        }
        self.process_event(event)
    }

    /// Whether advancing past the current endpoint would spend the last of
    /// the policy's sweep budget.
    fn exhausts_on_advance(&self) -> bool {
        self.uri_index + 1 >= self.uris.len()
            && self
                .policy
                .sweeps_exhausted(self.completed_sweeps.saturating_add(1))
    }

    /// Move the cursor past a failed endpoint, rolling into the next sweep
    /// at the end of the list. Exhaustion was ruled out before the failure
    /// event was applied.
    fn advance_after_failure(&mut self) -> Result<(), ConnectionError> {
        self.uri_index += 1;
        if self.uri_index >= self.uris.len() {
            self.completed_sweeps += 1;
            self.uri_index = 0;
        }
        self.attempt_endpoint()
    }

    /// Open a transport to the endpoint under the cursor and arm its
    /// connect timer.
    fn attempt_endpoint(&mut self) -> Result<(), ConnectionError> {
        self.process_event(ConnectionEvent::AttemptStarted)?;

        self.epoch += 1;
        self.close_live();

        let uri = &self.uris[self.uri_index];
        tracing::info!(
            %uri,
            epoch = self.epoch,
            completed_sweeps = self.completed_sweeps,
            "opening transport"
        );
        let (socket, events) = self.providers.transport().open(uri);
        self.shared.borrow_mut().live = Some(socket);
        self.fresh_events = Some(events);

        let timeout = self.policy.connect_timeout(self.completed_sweeps);
        self.deadline = Some(ConnectDeadline {
            epoch: self.epoch,
            at: self.providers.time().now() + timeout,
        });
        Ok(())
    }

    /// Route one socket event, discarding it if its epoch is stale.
    fn handle_socket_event(
        &mut self,
        epoch: u64,
        event: SocketEvent,
    ) -> Result<(), ConnectionError> {
        if epoch != self.epoch {
            tracing::trace!(
                stale = epoch,
                current = self.epoch,
                event = ?event,
                "ignoring event from superseded transport"
            );
            return Ok(());
        }

        match event {
            SocketEvent::Opened => self.process_event(ConnectionEvent::Succeeded),
            SocketEvent::Closed => self.fail_attempt(ConnectionEvent::Closed),
            SocketEvent::Errored => self.fail_attempt(ConnectionEvent::Errored),
            SocketEvent::Message(bytes) => {
                self.handle_inbound(bytes);
                Ok(())
            }
        }
    }

    /// Number an inbound payload at arrival and hand it to an async decode
    /// task. Arrival order is captured here even though decode completion
    /// order is not guaranteed.
    fn handle_inbound(&mut self, bytes: Vec<u8>) {
        if self.sm.state() != ConnectionState::Connected {
            tracing::warn!(
                len = bytes.len(),
                "dropping inbound payload outside connected state"
            );
            return;
        }

        let seq = self.order.assign_seq();
        let codec = self.codec.clone();
        let tx = self.decode_tx.clone();
        self.providers.task().spawn_task("decode", async move {
            let result = codec.decode::<M>(&bytes).await;
            let _ = tx.send((seq, result));
        });
    }

    /// Feed a decode completion to the ordering buffer and deliver the
    /// contiguous prefix it releases.
    fn handle_decoded(&mut self, seq: u64, result: Result<M, CodecError>) {
        let ready = match result {
            Ok(msg) => self.order.complete(seq, msg),
            Err(e) => {
                tracing::error!(seq, error = %e, "inbound decode failed, releasing slot");
                self.order.skip(seq)
            }
        };
        for msg in ready {
            (self.on_message)(msg);
        }
    }

    /// React to the connect timer firing for the attempt tagged `epoch`.
    ///
    /// The timer is stale when the attempt was superseded or the socket
    /// already left the connecting phase; both are no-ops.
    fn handle_connect_timeout(&mut self, epoch: u64) -> Result<(), ConnectionError> {
        self.deadline = None;

        if epoch != self.epoch {
            tracing::trace!(
                stale = epoch,
                current = self.epoch,
                "ignoring connect timer from superseded attempt"
            );
            return Ok(());
        }

        let still_connecting = self
            .shared
            .borrow()
            .live
            .as_ref()
            .map(|socket| socket.phase() == SocketPhase::Connecting)
            .unwrap_or(false);
        if !still_connecting {
            tracing::trace!("connect timer fired after resolution, ignoring");
            return Ok(());
        }

        tracing::warn!(uri = %self.uris[self.uri_index], "connect attempt timed out");
        self.fail_attempt(ConnectionEvent::TimedOut)
    }

    /// Step the state machine, notify the host, and perform the side
    /// effect the transition demands.
    ///
    /// Any pending connect timer is cancelled before the event is
    /// consumed.
    fn process_event(&mut self, event: ConnectionEvent) -> Result<(), ConnectionError> {
        self.deadline = None;

        let Transition {
            state,
            err_msg,
            action,
        } = self.sm.apply(event)?;

        self.shared.borrow_mut().state = state;
        (self.on_state_change)(StateChange { state, err_msg });

        match action {
            StepAction::None => Ok(()),
            StepAction::AdvanceAfterFailure => self.advance_after_failure(),
            StepAction::RestartSweep => self.start_sweep(),
        }
    }

    fn close_live(&mut self) {
        if let Some(mut old) = self.shared.borrow_mut().live.take() {
            tracing::debug!(epoch = self.epoch, "closing superseded transport");
            old.close();
        }
    }

    fn current_epoch(&self) -> u64 {
        self.epoch
    }

    fn connect_deadline(&self) -> Option<ConnectDeadline> {
        self.deadline
    }

    fn take_fresh_events(&mut self) -> Option<SocketEvents> {
        self.fresh_events.take()
    }
}

/// One resolved wakeup of the driver loop.
enum Step<M> {
    Shutdown,
    Socket(u64, SocketEvent),
    EventsGone,
    Decoded(u64, Result<M, CodecError>),
    Timeout(u64),
}

/// Background driver: selects over the async sources and feeds the reactor
/// one event per turn.
async fn drive<P, C, M>(
    mut reactor: Reactor<P, C, M>,
    mut decode_rx: mpsc::UnboundedReceiver<DecodeResult<M>>,
    mut shutdown_rx: mpsc::UnboundedReceiver<()>,
    time: P::Time,
) where
    P: Providers,
    C: MessageCodec,
    M: DeserializeOwned + 'static,
{
    if let Err(e) = reactor.start_sweep() {
        tracing::error!(error = %e, "connection driver aborted at startup");
        return;
    }
    let mut events: Option<(u64, SocketEvents)> = reactor
        .take_fresh_events()
        .map(|rx| (reactor.current_epoch(), rx));

    loop {
        let deadline = reactor.connect_deadline();

        let step = tokio::select! {
            _ = shutdown_rx.recv() => Step::Shutdown,
            ev = next_socket_event(&mut events) => match ev {
                Some((epoch, event)) => Step::Socket(epoch, event),
                None => Step::EventsGone,
            },
            decoded = decode_rx.recv() => match decoded {
                Some((seq, result)) => Step::Decoded(seq, result),
                // The reactor holds a sender; this arm cannot close first.
                None => Step::Shutdown,
            },
            epoch = wait_deadline(&time, deadline) => Step::Timeout(epoch),
        };

        let outcome = match step {
            Step::Shutdown => {
                tracing::debug!("connection driver shutting down");
                reactor.close_live();
                return;
            }
            Step::Socket(epoch, event) => reactor.handle_socket_event(epoch, event),
            Step::EventsGone => {
                events = None;
                Ok(())
            }
            Step::Decoded(seq, result) => {
                reactor.handle_decoded(seq, result);
                Ok(())
            }
            Step::Timeout(epoch) => reactor.handle_connect_timeout(epoch),
        };

        if let Err(e) = outcome {
            // Programming-error-class fault; never recovered from.
            tracing::error!(error = %e, "connection driver stopped");
            reactor.close_live();
            return;
        }

        // A step that opened a new socket replaces the event stream.
        if let Some(rx) = reactor.take_fresh_events() {
            events = Some((reactor.current_epoch(), rx));
        }
    }
}

/// Yield the next event of the current socket, tagged with its epoch.
/// Pends forever when no socket event stream is installed.
async fn next_socket_event(
    events: &mut Option<(u64, SocketEvents)>,
) -> Option<(u64, SocketEvent)> {
    match events {
        Some((epoch, rx)) => rx.recv().await.map(|event| (*epoch, event)),
        None => std::future::pending().await,
    }
}

/// Sleep until the armed connect deadline and yield its epoch. Pends
/// forever when no deadline is armed.
async fn wait_deadline<T: TimeProvider>(time: &T, deadline: Option<ConnectDeadline>) -> u64 {
    match deadline {
        Some(d) => {
            let now = time.now();
            if d.at > now {
                let _ = time.sleep(d.at - now).await;
            }
            d.epoch
        }
        None => std::future::pending().await,
    }
}
