//! Connection establishment and HTTP transports.
//!
//! - Raw byte streams via [`dialer`] (direct TCP) and [`proxy`] (CONNECT tunnel)
//! - TLS + ALPN via [`connector`] (BoringSSL)
//! - HTTP/1.1 via hyper, HTTP/2 via h2

pub mod connector;
pub mod dialer;
pub mod h1;
pub mod h2;
pub mod proxy;
pub mod tcp;

use bytes::Bytes;
use http::Request;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;
use crate::response::Response;
use crate::version::HttpVersion;

pub use connector::{BoringHandshaker, HandshakeOptions, Handshaker, KeyLog};
pub use dialer::{DirectDialer, Dialer};
pub use h1::{ConnectVia, Http1Transport};
pub use self::h2::Http2Transport;
pub use proxy::HttpConnectDialer;

/// Byte stream usable as an HTTP connection.
pub trait Io: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Io for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Type-erased connection, plain or TLS.
pub type BoxedIo = Box<dyn Io>;

/// Reusable transport for one destination and one negotiated protocol.
///
/// Built once from the protocol decision and never reconfigured afterwards.
pub enum Transport {
    Http1(Http1Transport),
    Http2(Http2Transport),
}

impl Transport {
    /// Perform one HTTP exchange.
    pub async fn round_trip(&self, request: Request<Bytes>) -> Result<Response> {
        match self {
            Transport::Http1(t) => t.round_trip(request).await,
            Transport::Http2(t) => t.round_trip(request).await,
        }
    }

    /// Protocol this transport speaks.
    pub fn version(&self) -> HttpVersion {
        match self {
            Transport::Http1(_) => HttpVersion::Http1_1,
            Transport::Http2(_) => HttpVersion::Http2,
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Http1(t) => f.debug_tuple("Http1").field(t).finish(),
            Transport::Http2(t) => f.debug_tuple("Http2").field(t).finish(),
        }
    }
}
