//! Timeout configuration for round-trips.
//!
//! # Timeout Types
//!
//! - **connect**: dial + protocol handshake. Applied inside the shared
//!   handshake, so every waiter of that handshake sees the same timeout error.
//! - **total**: absolute deadline for one caller's request, including waiting
//!   on somebody else's handshake. Expiry abandons only that caller's wait.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Timeout configuration for requests.
///
/// All timeouts are optional. When `None`, no timeout is applied for that phase.
#[derive(Clone, Debug, Default)]
pub struct Timeouts {
    /// Timeout for establishing a connection (DNS + TCP + TLS handshake).
    pub connect: Option<Duration>,

    /// Total request deadline. Does NOT reset.
    pub total: Option<Duration>,
}

impl Timeouts {
    /// Create a new Timeouts with all timeouts set to None.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set connect timeout.
    pub fn connect(mut self, timeout: Duration) -> Self {
        self.connect = Some(timeout);
        self
    }

    /// Set total request deadline.
    pub fn total(mut self, timeout: Duration) -> Self {
        self.total = Some(timeout);
        self
    }

    /// Disable connect timeout.
    pub fn no_connect_timeout(mut self) -> Self {
        self.connect = None;
        self
    }

    /// Disable total timeout.
    pub fn no_total_timeout(mut self) -> Self {
        self.total = None;
        self
    }
}

/// Run `fut` under an optional deadline, mapping expiry with `on_elapsed`.
pub(crate) async fn with_deadline<T, F>(
    deadline: Option<Duration>,
    fut: F,
    on_elapsed: impl FnOnce(Duration) -> Error,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| on_elapsed(limit))?,
        None => fut.await,
    }
}
