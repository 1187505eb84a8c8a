//! Retry and connect-timeout policy.
//!
//! The policy answers two questions per attempt: how long to wait for the
//! transport to open, and whether another full sweep across the endpoint
//! list is permitted. Both answers depend on whether the target is expected
//! to be on the same host.
//!
//! A local endpoint is expected to eventually become reachable (the server
//! may still be starting up), so local attempts fail fast and retry forever.
//! A remote endpoint's unreachability is more likely permanent within a
//! session, so remote attempts wait longer with each completed sweep and
//! give up after a fixed number of sweeps.

use std::time::Duration;

use super::config::ConnectionConfig;

/// Connect timeout for local endpoints. Local attempts retry indefinitely,
/// so failing fast is safe and desirable.
pub const LOCAL_CONNECT_TIMEOUT: Duration = Duration::from_millis(100);

/// Base connect timeout for remote endpoints. Grows linearly with each
/// completed sweep.
pub const REMOTE_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Number of full sweeps across the endpoint list permitted for remote
/// endpoints before the connection gives up.
pub const REMOTE_MAX_SWEEPS: u32 = 3;

/// Whether the target endpoints live on the same host as this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locality {
    /// Same host; retry forever with a short fixed timeout.
    Local,
    /// Different host; bounded sweeps with a growing timeout.
    Remote,
}

/// Per-attempt timeout and sweep-bound decisions, fixed at construction.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    locality: Locality,
    local_timeout: Duration,
    remote_timeout: Duration,
    remote_max_sweeps: u32,
}

impl RetryPolicy {
    /// Create a policy with the default constants for the given locality.
    pub fn new(locality: Locality) -> Self {
        Self {
            locality,
            local_timeout: LOCAL_CONNECT_TIMEOUT,
            remote_timeout: REMOTE_CONNECT_TIMEOUT,
            remote_max_sweeps: REMOTE_MAX_SWEEPS,
        }
    }

    /// Create a policy from a connection configuration.
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            locality: config.locality,
            local_timeout: config.local_connect_timeout,
            remote_timeout: config.remote_connect_timeout,
            remote_max_sweeps: config.remote_max_sweeps,
        }
    }

    /// Connect timeout for an attempt, given the number of completed sweeps.
    ///
    /// Local: fixed. Remote: base × (sweeps + 1), trading latency for
    /// patience as failures accumulate.
    pub fn connect_timeout(&self, completed_sweeps: u32) -> Duration {
        match self.locality {
            Locality::Local => self.local_timeout,
            Locality::Remote => self.remote_timeout * completed_sweeps.saturating_add(1),
        }
    }

    /// Maximum number of full sweeps, or `None` for unbounded (local).
    pub fn max_sweeps(&self) -> Option<u32> {
        match self.locality {
            Locality::Local => None,
            Locality::Remote => Some(self.remote_max_sweeps),
        }
    }

    /// Whether `completed_sweeps` full sweeps exhaust the retry budget.
    pub fn sweeps_exhausted(&self, completed_sweeps: u32) -> bool {
        self.max_sweeps()
            .is_some_and(|max| completed_sweeps >= max)
    }
}
