//! Resilient connection lifecycle management.
//!
//! This module provides the [`Connection`] abstraction: a client-side
//! transport that drives connection attempts across a prioritized list of
//! candidate endpoints, enforces connect timeouts, retries with
//! policy-dependent limits, and reassembles asynchronously-decoded inbound
//! messages into strict arrival order before delivering them to the host
//! application.
//!
//! # Connection Lifecycle
//!
//! ```text
//!             attempt                succeeded
//! ┌─────────┐ started ┌────────────┐──────────►┌───────────┐
//! │ Initial ├────────►│ Initial    │           │ Connected │
//! └─────────┘         │ Connecting │           └─────┬─────┘
//!                     └─────┬──────┘                 │ closed
//!             timeout/error/│closed                  ▼
//!                           ▼              ┌──────────────┐
//!                  ┌──────────────┐ attempt│ Disconnected │
//!                  │ Disconnected ├───────►│ (fresh sweep │
//!                  └─────┬────────┘started │  from uri 0) │
//!        retries         │                 └──────────────┘
//!        exhausted       ▼
//!                  ┌───────┐
//!                  │ Error │
//!                  └───────┘
//! ```
//!
//! # Retry Strategy
//!
//! One *sweep* tries every endpoint in order. Local endpoints fail fast
//! (fixed 100ms connect timeout) and retry forever, on the assumption that a
//! local server is still starting up. Remote endpoints wait longer with each
//! completed sweep (2s × (sweeps + 1)) and give up after a fixed number of
//! sweeps, on the assumption that a remote endpoint's unreachability is more
//! likely permanent.
//!
//! # Ordering Guarantee
//!
//! Inbound payloads are numbered synchronously at byte arrival, before
//! asynchronous decoding begins. Decode completions may land in any order;
//! the [`OrderingBuffer`] releases only the contiguous prefix, so the host
//! callback always observes messages in exact arrival order.

/// Connection orchestrator and public handle
pub mod core;

/// Configuration structures for connection behavior
pub mod config;

/// Error types specific to connection operations
pub mod error;

/// Arrival-order reassembly of asynchronously decoded messages
pub mod order;

/// Retry and connect-timeout policy
pub mod policy;

/// Lifecycle state machine and legal-transition table
pub mod state;

// Re-export main types
pub use config::ConnectionConfig;
pub use core::{Connection, StateChange};
pub use error::ConnectionError;
pub use order::OrderingBuffer;
pub use policy::{Locality, RetryPolicy};
pub use state::{ConnectionEvent, ConnectionState, StateMachine, StepAction, Transition};
