//! Lifecycle state machine for the connection.
//!
//! The state machine owns the current [`ConnectionState`] and processes
//! [`ConnectionEvent`]s against an explicit legal-transition table. Any
//! (state, event) pair not in the table is a logic defect in the caller and
//! yields [`ConnectionError::IllegalTransition`]; it is never silently
//! accepted.

use super::error::ConnectionError;

/// Message reported with the terminal `Error` state when retries run out.
const RETRIES_EXHAUSTED_MSG: &str = "Retries exhausted";

/// Lifecycle state of a connection. Exactly one value is current at any
/// time, owned exclusively by the [`StateMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, no attempt made yet.
    Initial,
    /// First-ever attempt in flight.
    InitialConnecting,
    /// A transport is open and carrying traffic.
    Connected,
    /// The last attempt or session ended; a retry decision is pending.
    Disconnected,
    /// A post-failure attempt is in flight.
    Reconnecting,
    /// Retries exhausted; terminal unless the host builds a new connection.
    Error,
    /// Connectionless display mode; no live transport is desired and no
    /// event is legal.
    Static,
}

/// Events consumed by the state machine. Ephemeral; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// An attempt to one endpoint was started.
    AttemptStarted,
    /// The in-flight attempt's transport opened.
    Succeeded,
    /// The transport closed.
    Closed,
    /// The transport reported an error.
    Errored,
    /// The in-flight attempt's connect timer fired.
    TimedOut,
    /// Every endpoint failed in every permitted sweep.
    RetriesExhausted,
}

/// Side effect the orchestrator must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// No follow-up action.
    None,
    /// Advance the endpoint cursor and attempt the next candidate.
    AdvanceAfterFailure,
    /// Restart a fresh attempt sweep from the first endpoint.
    RestartSweep,
}

/// Outcome of a legal transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// The state entered by this transition.
    pub state: ConnectionState,
    /// Optional human-readable error message for the host application.
    pub err_msg: Option<String>,
    /// Side effect the orchestrator must perform.
    pub action: StepAction,
}

/// Owner of the current lifecycle state and the legal-transition table.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: ConnectionState,
}

impl StateMachine {
    /// Create a state machine in the `Initial` state.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Initial,
        }
    }

    /// Create a state machine pinned in the `Static` mode.
    pub fn new_static() -> Self {
        Self {
            state: ConnectionState::Static,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Apply one event against the legal-transition table.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::IllegalTransition`] for any (state, event)
    /// pair not explicitly called out in the table.
    pub fn apply(&mut self, event: ConnectionEvent) -> Result<Transition, ConnectionError> {
        use ConnectionEvent as E;
        use ConnectionState as S;

        let (next, err_msg, action) = match (self.state, event) {
            (S::Initial, E::AttemptStarted) => (S::InitialConnecting, None, StepAction::None),

            (S::Disconnected | S::Error, E::AttemptStarted) => {
                (S::Reconnecting, None, StepAction::None)
            }

            (S::InitialConnecting | S::Reconnecting, E::Succeeded) => {
                (S::Connected, None, StepAction::None)
            }

            (S::InitialConnecting | S::Reconnecting, E::TimedOut | E::Errored | E::Closed) => {
                (S::Disconnected, None, StepAction::AdvanceAfterFailure)
            }

            (S::InitialConnecting | S::Reconnecting, E::RetriesExhausted) => (
                S::Error,
                Some(RETRIES_EXHAUSTED_MSG.to_string()),
                StepAction::None,
            ),

            (S::Connected, E::Closed) => (S::Disconnected, None, StepAction::RestartSweep),

            (state, event) => return Err(ConnectionError::IllegalTransition { state, event }),
        };

        tracing::debug!(from = ?self.state, event = ?event, to = ?next, "state transition");
        self.state = next;
        Ok(Transition {
            state: next,
            err_msg,
            action,
        })
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
