//! Provider bundle trait for simplified type parameters.
//!
//! Without bundling, connection code would carry three separate type
//! parameters:
//!
//! ```text
//! struct Connection<T, Ti, Ta>
//! where
//!     T: TransportProvider + 'static,
//!     Ti: TimeProvider + Clone + 'static,
//!     Ta: TaskProvider + Clone + 'static,
//! ```
//!
//! With bundling this simplifies to `struct Connection<P: Providers>`.
//!
//! The production bundle over framed TCP (`TcpProviders`) lives in the
//! `lifeline-transport` crate next to its socket implementation; test suites
//! assemble their own bundles from scripted providers.

use crate::{TaskProvider, TimeProvider, TransportProvider};

/// Bundle of all provider types for a runtime environment.
///
/// Consolidates [`TransportProvider`], [`TimeProvider`], and [`TaskProvider`]
/// into a single type parameter. Associated types preserve type information
/// at compile time without runtime dispatch.
pub trait Providers: Clone + 'static {
    /// Transport provider type for opening duplex message sockets.
    type Transport: TransportProvider + 'static;

    /// Time provider type for sleep, timeout, and time queries.
    type Time: TimeProvider + Clone + 'static;

    /// Task provider type for spawning local tasks.
    type Task: TaskProvider + Clone + 'static;

    /// Get the transport provider instance.
    fn transport(&self) -> &Self::Transport;

    /// Get the time provider instance.
    fn time(&self) -> &Self::Time;

    /// Get the task provider instance.
    fn task(&self) -> &Self::Task;
}
