//! Normalized destination addresses.

use std::fmt;

use http::Uri;

use crate::error::{Error, Result};

/// Cache key for one destination: lowercased `host:port` plus whether the
/// destination is reached over TLS.
///
/// A missing port defaults to the scheme's standard port, so `https://host`
/// and `https://host:443` share one entry.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct Destination {
    host: String,
    port: u16,
    secure: bool,
}

impl Destination {
    /// Default port for secure destinations.
    pub const HTTPS_PORT: u16 = 443;
    /// Default port for plain destinations.
    pub const HTTP_PORT: u16 = 80;

    /// Build a destination from an explicit host and port.
    pub fn new(host: impl Into<String>, port: u16, secure: bool) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
            port,
            secure,
        }
    }

    /// Normalize a request target.
    ///
    /// Schemes other than `http` and `https` are rejected without touching any
    /// cache.
    pub fn from_uri(uri: &Uri) -> Result<Self> {
        let scheme = uri.scheme_str().unwrap_or("").to_ascii_lowercase();
        let secure = match scheme.as_str() {
            "https" => true,
            "http" => false,
            _ => {
                return Err(Error::configuration(format!(
                    "invalid URL scheme: [{}]",
                    uri.scheme_str().unwrap_or("")
                )))
            }
        };
        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::configuration(format!("URL has no host: {}", uri)))?;
        let port = uri.port_u16().unwrap_or(if secure {
            Self::HTTPS_PORT
        } else {
            Self::HTTP_PORT
        });
        Ok(Self::new(host, port, secure))
    }

    /// Host as written in the URL (IPv6 literals keep their brackets).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Host suitable for SNI and certificate checks.
    pub fn server_name(&self) -> &str {
        self.host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(&self.host)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// `host:port` string used for dialing and logging.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
