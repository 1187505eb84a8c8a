//! Error types for connection operations.

use thiserror::Error;

use super::state::{ConnectionEvent, ConnectionState};

/// Errors that can occur during connection operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// A (state, event) pair outside the legal-transition table.
    ///
    /// This is a programming-error-class fault: it indicates a defect in the
    /// orchestrator, not a runtime condition to recover from. The driver
    /// stops when it sees one.
    #[error("unsupported state transition: state {state:?}, event {event:?}")]
    IllegalTransition {
        /// State the machine was in when the event arrived.
        state: ConnectionState,
        /// The event that had no legal transition from that state.
        event: ConnectionEvent,
    },

    /// The endpoint list passed at construction was empty.
    #[error("endpoint list must not be empty")]
    EmptyEndpointList,
}
