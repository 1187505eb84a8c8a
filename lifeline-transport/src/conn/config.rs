//! Configuration structures for connection behavior.

use std::time::Duration;

use super::policy::{
    LOCAL_CONNECT_TIMEOUT, Locality, REMOTE_CONNECT_TIMEOUT, REMOTE_MAX_SWEEPS,
};

/// Configuration for connection retry and timeout behavior.
///
/// The locality flag is fixed for the lifetime of the connection; the
/// timeout fields exist so tests and unusual deployments can tighten or
/// loosen the policy constants.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Whether the endpoints are expected to be on the same host.
    pub locality: Locality,

    /// Connect timeout for local endpoints (fixed per attempt).
    pub local_connect_timeout: Duration,

    /// Base connect timeout for remote endpoints (grows with each sweep).
    pub remote_connect_timeout: Duration,

    /// Number of full endpoint sweeps permitted for remote endpoints.
    pub remote_max_sweeps: u32,
}

impl ConnectionConfig {
    /// Configuration for a server on the same host.
    pub fn local() -> Self {
        Self {
            locality: Locality::Local,
            local_connect_timeout: LOCAL_CONNECT_TIMEOUT,
            remote_connect_timeout: REMOTE_CONNECT_TIMEOUT,
            remote_max_sweeps: REMOTE_MAX_SWEEPS,
        }
    }

    /// Configuration for a server on a different host.
    pub fn remote() -> Self {
        Self {
            locality: Locality::Remote,
            ..Self::local()
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::remote()
    }
}
