//! HTTP/2 transport via the `h2` crate.
//!
//! All exchanges share one multiplexed connection. When that connection is
//! found dead, the next exchange opens a replacement through the transport's
//! [`Redial`], i.e. the pending slot first and the coordinator second.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use ::h2::client::SendRequest;
use bytes::{Bytes, BytesMut};
use http::Request;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::fingerprint::http2::Http2Settings;
use crate::pool::Redial;
use crate::response::{Response, RxClock};
use crate::timeouts::with_deadline;
use crate::version::HttpVersion;

#[derive(Clone)]
struct Session {
    generation: u64,
    sender: SendRequest<Bytes>,
}

/// HTTP/2 transport for one destination.
pub struct Http2Transport {
    redial: Redial,
    settings: Http2Settings,
    rx_timestamps: bool,
    session: Mutex<Option<Session>>,
    generations: AtomicU64,
}

impl Http2Transport {
    pub fn new(redial: Redial, settings: Http2Settings, rx_timestamps: bool) -> Self {
        Self {
            redial,
            settings,
            rx_timestamps,
            session: Mutex::new(None),
            generations: AtomicU64::new(0),
        }
    }

    /// Settings applied to every connection of this transport.
    pub fn settings(&self) -> &Http2Settings {
        &self.settings
    }

    /// Perform one exchange as a new stream on the shared connection.
    pub async fn round_trip(&self, request: Request<Bytes>) -> Result<Response> {
        let mut sender = self.sender().await?;

        let (parts, body) = request.into_parts();
        let end_of_stream = body.is_empty();
        let (response, mut stream) = sender
            .send_request(Request::from_parts(parts, ()), end_of_stream)
            .map_err(|e| Error::dispatch(format!("HTTP/2 request failed: {}", e)))?;
        if !end_of_stream {
            stream
                .send_data(body, true)
                .map_err(|e| Error::dispatch(format!("HTTP/2 send body failed: {}", e)))?;
        }

        let response = response
            .await
            .map_err(|e| Error::dispatch(format!("HTTP/2 response failed: {}", e)))?;

        let mut clock = RxClock::default();
        if self.rx_timestamps {
            clock.head();
        }

        let (parts, mut recv) = response.into_parts();
        let mut buf = BytesMut::new();
        while let Some(chunk) = recv.data().await {
            let chunk =
                chunk.map_err(|e| Error::dispatch(format!("Failed to read body: {}", e)))?;
            if self.rx_timestamps {
                clock.data();
            }
            recv.flow_control()
                .release_capacity(chunk.len())
                .map_err(|e| Error::dispatch(format!("Failed to release capacity: {}", e)))?;
            buf.extend_from_slice(&chunk);
        }

        Ok(Response::new(
            parts.status.as_u16(),
            parts.headers,
            buf.freeze(),
            HttpVersion::Http2,
        )
        .with_timestamps(clock.finish()))
    }

    /// A sender with stream capacity, replacing a dead connection if needed.
    async fn sender(&self) -> Result<SendRequest<Bytes>> {
        let current = self.current().await?;
        match current.sender.ready().await {
            Ok(sender) => Ok(sender),
            Err(e) => {
                tracing::debug!(
                    "HTTP/2 connection to {} unusable ({}), redialing",
                    self.redial.destination(),
                    e
                );
                let fresh = self.replace(current.generation).await?;
                fresh
                    .sender
                    .ready()
                    .await
                    .map_err(|e| Error::dispatch(format!("HTTP/2 connection not ready: {}", e)))
            }
        }
    }

    async fn current(&self) -> Result<Session> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }
        let session = self.open().await?;
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Replace the session identified by `stale` unless someone already did.
    async fn replace(&self, stale: u64) -> Result<Session> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            if session.generation != stale {
                return Ok(session.clone());
            }
        }
        *slot = None;
        let session = self.open().await?;
        *slot = Some(session.clone());
        Ok(session)
    }

    async fn open(&self) -> Result<Session> {
        let io = self.redial.connect().await?;
        let builder = self.settings.client_builder();

        let (sender, connection) = with_deadline(
            self.settings.handshake_timeout,
            async move {
                builder
                    .handshake::<_, Bytes>(io)
                    .await
                    .map_err(|e| Error::dispatch(format!("HTTP/2 handshake failed: {}", e)))
            },
            |elapsed| Error::dispatch(format!("HTTP/2 handshake timed out after {:?}", elapsed)),
        )
        .await?;

        let dest = self.redial.destination().clone();
        tokio::spawn(async move {
            match connection.await {
                Ok(()) => tracing::debug!("HTTP/2 connection to {} closed", dest),
                Err(e) => tracing::error!("HTTP/2 connection to {} failed: {}", dest, e),
            }
        });

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            "HTTP/2 connection #{} to {} established",
            generation,
            self.redial.destination()
        );
        Ok(Session { generation, sender })
    }
}

impl fmt::Debug for Http2Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Http2Transport")
            .field("redial", &self.redial)
            .field("settings", &self.settings)
            .field("rx_timestamps", &self.rx_timestamps)
            .finish_non_exhaustive()
    }
}
