//! Negotiated HTTP version.

/// ALPN identifier for HTTP/2.
pub const ALPN_H2: &str = "h2";

/// ALPN identifier for HTTP/1.1.
pub const ALPN_HTTP1: &str = "http/1.1";

/// HTTP version spoken on a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpVersion {
    /// HTTP/1.x (over TLS or plain TCP).
    #[default]
    Http1_1,
    /// HTTP/2 over TLS.
    Http2,
}

impl HttpVersion {
    /// Map a negotiated ALPN protocol to a version.
    ///
    /// Only `h2` selects HTTP/2. Any other value, or no ALPN at all, means the
    /// peer speaks HTTP/1.x.
    pub fn from_alpn(alpn: Option<&[u8]>) -> Self {
        match alpn {
            Some(proto) if proto == ALPN_H2.as_bytes() => Self::Http2,
            _ => Self::Http1_1,
        }
    }

    /// Get human-readable version string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http1_1 => "HTTP/1.1",
            Self::Http2 => "HTTP/2",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_alpn() {
        assert_eq!(HttpVersion::from_alpn(Some(b"h2")), HttpVersion::Http2);
        assert_eq!(
            HttpVersion::from_alpn(Some(b"http/1.1")),
            HttpVersion::Http1_1
        );
        assert_eq!(HttpVersion::from_alpn(Some(b"h3")), HttpVersion::Http1_1);
        assert_eq!(HttpVersion::from_alpn(None), HttpVersion::Http1_1);
    }
}
