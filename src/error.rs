//! Error types for wraith crate.

use std::time::Duration;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Phase of a round-trip in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Invalid input or configuration, never retried.
    Configuration,
    /// Raw connection (direct or proxy tunnel) could not be opened.
    Dial,
    /// Protocol handshake failed after the raw connection was opened.
    Handshake,
    /// A ready transport failed to complete an individual request.
    Dispatch,
}

/// Errors that can occur while dispatching a request.
///
/// Errors produced by a shared handshake are broadcast to every waiter of
/// that handshake, so the type is `Clone`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Invalid request scheme, proxy URL or unopenable key log sink.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Raw connection could not be established.
    #[error("Dial to {addr} failed: {message}")]
    Dial { addr: String, message: String },

    /// Protocol handshake failed.
    #[error("Handshake with {addr} failed: {message}")]
    Handshake { addr: String, message: String },

    /// Dial + handshake did not complete in time.
    #[error("Connect timeout after {0:?}")]
    ConnectTimeout(Duration),

    /// Exchange on an established transport failed.
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Whole-request deadline exceeded.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Redirect limit exceeded.
    #[error("Redirect limit exceeded ({count} redirects)")]
    RedirectLimit { count: u32 },

    /// Invalid redirect URL.
    #[error("Invalid redirect URL: {0}")]
    InvalidRedirectUrl(String),

    /// URL parsing error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a dial error for an address.
    pub fn dial(addr: impl Into<String>, message: impl ToString) -> Self {
        Self::Dial {
            addr: addr.into(),
            message: message.to_string(),
        }
    }

    /// Create a handshake error for an address.
    pub fn handshake(addr: impl Into<String>, message: impl ToString) -> Self {
        Self::Handshake {
            addr: addr.into(),
            message: message.to_string(),
        }
    }

    /// Create a dispatch error.
    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::Dispatch(message.into())
    }

    /// The phase this error belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            Self::Configuration(_) | Self::UrlParse(_) | Self::InvalidRedirectUrl(_) => {
                Phase::Configuration
            }
            Self::Dial { .. } | Self::ConnectTimeout(_) => Phase::Dial,
            Self::Handshake { .. } => Phase::Handshake,
            Self::Dispatch(_) | Self::Timeout(_) | Self::RedirectLimit { .. } => Phase::Dispatch,
        }
    }

    /// Whether retrying the same request could succeed.
    ///
    /// The dispatcher itself never retries; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RedirectLimit { .. } => false,
            _ => self.phase() != Phase::Configuration,
        }
    }
}
