//! Protocol decision: negotiated ALPN -> transport.

use std::sync::Arc;

use crate::fingerprint::http2::Http2Settings;
use crate::pool::coordinator::Redial;
use crate::pool::destination::Destination;
use crate::transport::{ConnectVia, Dialer, Http1Transport, Http2Transport, Transport};
use crate::version::HttpVersion;

/// Builds the transport that serves a destination from then on.
///
/// HTTP/2 transports always carry the same [`Http2Settings`]; nothing about
/// the connection that triggered the build changes them.
#[derive(Debug, Clone, Default)]
pub struct TransportSelector {
    http2: Http2Settings,
    rx_timestamps: bool,
}

impl TransportSelector {
    pub fn new(http2: Http2Settings, rx_timestamps: bool) -> Self {
        Self {
            http2,
            rx_timestamps,
        }
    }

    pub fn http2_settings(&self) -> &Http2Settings {
        &self.http2
    }

    /// Transport for a TLS destination. New connections come from `redial`.
    pub fn select(&self, version: HttpVersion, redial: Redial) -> Transport {
        match version {
            HttpVersion::Http2 => Transport::Http2(Http2Transport::new(
                redial,
                self.http2.clone(),
                self.rx_timestamps,
            )),
            HttpVersion::Http1_1 => Transport::Http1(Http1Transport::new(
                ConnectVia::Tls(redial),
                self.rx_timestamps,
            )),
        }
    }

    /// Transport for a plain destination: direct dial, no handshake.
    pub fn plain(&self, dest: &Destination, dialer: Arc<dyn Dialer>) -> Transport {
        Transport::Http1(Http1Transport::new(
            ConnectVia::plain(dialer, dest),
            self.rx_timestamps,
        ))
    }
}
