//! # lifeline-transport
//!
//! Resilient client-side transport for a continuous, ordered stream of
//! server-pushed messages over a single logical connection.
//!
//! This crate provides:
//! - **Connection**: lifecycle state machine with round-robin retry across a
//!   prioritized endpoint list and connect timeouts
//! - **Ordering buffer**: reassembles asynchronously-decoded inbound
//!   messages into strict arrival order
//! - **Wire format**: length + CRC32C framing for the bundled TCP transport
//!
//! The connection survives transient network failures and server restarts
//! without losing or reordering data, and reports connectivity through a
//! single state-change notification channel.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

// Re-export core types for convenience
pub use lifeline_core::{
    CodecError, JsonCodec, MessageCodec, Providers, SocketEvent, SocketEvents, SocketPhase,
    TaskProvider, TimeError, TimeProvider, TokioTaskProvider, TokioTimeProvider,
    TransportProvider, TransportSocket,
};

// =============================================================================
// Modules
// =============================================================================

/// Resilient connection lifecycle management.
pub mod conn;

/// Framed TCP implementation of the transport socket contract.
pub mod net;

/// Length + CRC32C wire framing.
pub mod wire;

// =============================================================================
// Public API Re-exports
// =============================================================================

// Connection exports
pub use conn::{
    Connection, ConnectionConfig, ConnectionError, ConnectionEvent, ConnectionState, Locality,
    OrderingBuffer, RetryPolicy, StateChange, StateMachine, StepAction, Transition,
};

// TCP transport exports
pub use net::{TcpProviders, TcpTransportProvider};

// Wire format exports
pub use wire::{FRAME_HEADER_SIZE, FrameError, MAX_FRAME_PAYLOAD, encode_frame, try_decode_frame};
