//! # lifeline-core
//!
//! Core abstractions for the lifeline client transport.
//!
//! This crate provides the contracts that the connection layer is written
//! against, so the same logic runs over real sockets in production and over
//! scripted in-memory sockets in tests:
//!
//! - **Provider traits**: abstractions for time, tasks, and the duplex
//!   message socket
//! - **Codec trait**: pluggable message serialization with asynchronous
//!   decoding
//!
//! ## Provider Traits
//!
//! - [`TransportProvider`] / [`TransportSocket`]: open a full-duplex message
//!   socket to one URI and observe its lifecycle events
//! - [`TimeProvider`]: sleep, timeout, and time queries
//! - [`TaskProvider`]: task spawning for single-threaded environments
//!
//! The production bundle implementing [`Providers`] over framed TCP lives in
//! the `lifeline-transport` crate.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod codec;
mod providers;
mod socket;
mod task;
mod time;

// Codec exports
pub use codec::{CodecError, JsonCodec, MessageCodec};

// Provider trait exports
pub use providers::Providers;
pub use socket::{SocketEvent, SocketEvents, SocketPhase, TransportProvider, TransportSocket};
pub use task::{TaskProvider, TokioTaskProvider};
pub use time::{TimeError, TimeProvider, TokioTimeProvider};
