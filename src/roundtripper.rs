//! Request dispatch entry point.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::Request;

use crate::error::{Error, Result};
use crate::fingerprint::http2::Http2Settings;
use crate::pool::{
    ConnectionCache, ConnectionHook, Connector, Destination, HandshakeCoordinator, Need,
    TransportSelector,
};
use crate::response::Response;
use crate::transport::{
    BoringHandshaker, Dialer, DirectDialer, HandshakeOptions, Handshaker, Transport,
};

/// Construction-time configuration of a [`RoundTripper`].
#[derive(Clone)]
pub struct DispatcherConfig {
    /// Raw connection source, direct or tunnelled.
    pub dialer: Arc<dyn Dialer>,
    pub handshaker: Arc<dyn Handshaker>,
    pub handshake: HandshakeOptions,
    /// Deadline for the shared dial + handshake.
    pub connect_timeout: Option<Duration>,
    /// Attach [`crate::RxTimestamps`] to every response.
    pub rx_timestamps: bool,
    pub on_new_connection: Option<ConnectionHook>,
    pub http2: Http2Settings,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            dialer: Arc::new(DirectDialer::new()),
            handshaker: Arc::new(BoringHandshaker::default()),
            handshake: HandshakeOptions::default(),
            connect_timeout: None,
            rx_timestamps: false,
            on_new_connection: None,
            http2: Http2Settings::default(),
        }
    }
}

impl fmt::Debug for DispatcherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherConfig")
            .field("handshake", &self.handshake)
            .field("connect_timeout", &self.connect_timeout)
            .field("rx_timestamps", &self.rx_timestamps)
            .field("http2", &self.http2)
            .finish_non_exhaustive()
    }
}

/// Finds or creates the transport for a request's destination and hands the
/// request to it.
///
/// Transports are cached per destination for the lifetime of the
/// `RoundTripper`. Secure destinations get their protocol from the first
/// coordinated handshake; plain destinations always use HTTP/1.1.
pub struct RoundTripper {
    coordinator: Arc<HandshakeCoordinator>,
    dialer: Arc<dyn Dialer>,
}

impl RoundTripper {
    pub fn new(config: DispatcherConfig) -> Self {
        let selector = TransportSelector::new(config.http2, config.rx_timestamps);
        let connector = Connector {
            dialer: config.dialer.clone(),
            handshaker: config.handshaker,
            options: config.handshake,
            on_new_connection: config.on_new_connection,
            connect_timeout: config.connect_timeout,
        };
        Self {
            coordinator: HandshakeCoordinator::new(
                Arc::new(ConnectionCache::new()),
                connector,
                selector,
            ),
            dialer: config.dialer,
        }
    }

    /// Dispatch one request.
    ///
    /// The request URI must be absolute. Errors from the selected transport
    /// are returned as-is and never evict it.
    pub async fn round_trip(&self, request: Request<Bytes>) -> Result<Response> {
        let dest = Destination::from_uri(request.uri())?;
        let transport = self.transport_for(&dest).await?;
        transport.round_trip(request).await
    }

    async fn transport_for(&self, dest: &Destination) -> Result<Arc<Transport>> {
        let cache = self.coordinator.cache();
        if let Some(transport) = cache.transport(dest).await {
            return Ok(transport);
        }

        if !dest.is_secure() {
            let selector = self.coordinator.selector();
            return Ok(cache
                .get_or_insert_with(dest, || selector.plain(dest, self.dialer.clone()))
                .await);
        }

        tracing::debug!("RoundTripper: no transport for {}, coordinating handshake", dest);
        self.coordinator.acquire(dest, Need::Transport).await?;
        cache
            .transport(dest)
            .await
            .ok_or_else(|| Error::dispatch(format!("no transport installed for {}", dest)))
    }

    /// Cached transport for `dest`, if any.
    pub async fn transport(&self, dest: &Destination) -> Option<Arc<Transport>> {
        self.coordinator.cache().transport(dest).await
    }

    /// Number of destinations with a cached transport.
    pub async fn cached_destinations(&self) -> usize {
        self.coordinator.cache().len().await
    }
}

impl Default for RoundTripper {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

impl fmt::Debug for RoundTripper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoundTripper")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}
