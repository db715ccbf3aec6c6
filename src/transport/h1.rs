//! HTTP/1.1 transport via hyper.
//!
//! One request per connection at a time; finished connections are kept in an
//! idle list and reused by later exchanges.

use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::header::{HeaderValue, HOST};
use http::{Request, Uri};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::pool::{Destination, Redial};
use crate::response::{Response, RxClock};
use crate::transport::{BoxedIo, Dialer};
use crate::version::HttpVersion;

type Sender = http1::SendRequest<Full<Bytes>>;

/// Where an [`Http1Transport`] gets new connections from.
pub enum ConnectVia {
    /// TLS: pending connection or coordinated handshake.
    Tls(Redial),
    /// Plain TCP (or proxy tunnel) with no handshake.
    Plain { dialer: Arc<dyn Dialer>, addr: String },
}

impl ConnectVia {
    pub fn plain(dialer: Arc<dyn Dialer>, dest: &Destination) -> Self {
        Self::Plain {
            dialer,
            addr: dest.addr(),
        }
    }

    async fn connect(&self) -> Result<BoxedIo> {
        match self {
            Self::Tls(redial) => redial.connect().await,
            Self::Plain { dialer, addr } => dialer
                .dial(addr)
                .await
                .map_err(|e| Error::dial(addr.as_str(), e)),
        }
    }
}

impl fmt::Debug for ConnectVia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tls(redial) => f.debug_tuple("Tls").field(redial).finish(),
            Self::Plain { addr, .. } => f.debug_struct("Plain").field("addr", addr).finish(),
        }
    }
}

/// HTTP/1.1 transport for one destination.
pub struct Http1Transport {
    via: ConnectVia,
    idle: Mutex<Vec<Sender>>,
    rx_timestamps: bool,
}

impl Http1Transport {
    pub fn new(via: ConnectVia, rx_timestamps: bool) -> Self {
        Self {
            via,
            idle: Mutex::new(Vec::new()),
            rx_timestamps,
        }
    }

    /// Whether new connections go through a TLS handshake.
    pub fn is_tls(&self) -> bool {
        matches!(self.via, ConnectVia::Tls(_))
    }

    /// Number of idle connections kept for reuse.
    pub async fn idle_connections(&self) -> usize {
        self.idle.lock().await.len()
    }

    /// Perform one exchange on an idle or freshly opened connection.
    pub async fn round_trip(&self, request: Request<Bytes>) -> Result<Response> {
        let request = origin_form(request)?;
        let mut sender = self.checkout().await?;

        let response = sender
            .send_request(request.map(Full::new))
            .await
            .map_err(|e| Error::dispatch(format!("HTTP/1.1 request failed: {}", e)))?;

        let mut clock = RxClock::default();
        if self.rx_timestamps {
            clock.head();
        }

        let (parts, mut body) = response.into_parts();
        let mut buf = BytesMut::new();
        while let Some(frame) = body.frame().await {
            let frame =
                frame.map_err(|e| Error::dispatch(format!("Failed to read body: {}", e)))?;
            if let Ok(data) = frame.into_data() {
                if self.rx_timestamps {
                    clock.data();
                }
                buf.extend_from_slice(&data);
            }
        }

        if !sender.is_closed() {
            self.idle.lock().await.push(sender);
        }

        Ok(Response::new(
            parts.status.as_u16(),
            parts.headers,
            buf.freeze(),
            HttpVersion::Http1_1,
        )
        .with_timestamps(clock.finish()))
    }

    async fn checkout(&self) -> Result<Sender> {
        loop {
            let Some(mut sender) = self.idle.lock().await.pop() else {
                break;
            };
            if sender.is_closed() {
                continue;
            }
            if sender.ready().await.is_ok() {
                return Ok(sender);
            }
        }

        let io = self.via.connect().await?;
        let (sender, conn) = http1::handshake(TokioIo::new(io))
            .await
            .map_err(|e| Error::dispatch(format!("HTTP/1.1 handshake failed: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::error!("HTTP/1.1 connection error: {}", e);
            }
        });

        Ok(sender)
    }
}

impl fmt::Debug for Http1Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Http1Transport")
            .field("via", &self.via)
            .field("rx_timestamps", &self.rx_timestamps)
            .finish_non_exhaustive()
    }
}

/// Rewrite an absolute-form request to origin-form with a `Host` header.
fn origin_form(mut request: Request<Bytes>) -> Result<Request<Bytes>> {
    if !request.headers().contains_key(HOST) {
        let authority = request
            .uri()
            .authority()
            .ok_or_else(|| Error::configuration(format!("URL has no host: {}", request.uri())))?;
        let host = HeaderValue::from_str(authority.as_str())
            .map_err(|e| Error::configuration(format!("Invalid host: {}", e)))?;
        request.headers_mut().insert(HOST, host);
    }

    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let path: Uri = path
        .parse()
        .map_err(|e| Error::configuration(format!("Invalid request path: {}", e)))?;
    *request.uri_mut() = path;
    Ok(request)
}
