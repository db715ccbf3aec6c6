//! HTTP response returned by a transport.

use std::time::SystemTime;

use bytes::Bytes;
use http::HeaderMap;

use crate::error::{Error, Result};
use crate::version::HttpVersion;

/// Receive timestamps for one exchange.
///
/// `first` is taken when the response head arrives and `last` when the final
/// body byte has been read, so two exchanges multiplexed on one connection
/// never share a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxTimestamps {
    pub first: SystemTime,
    pub last: SystemTime,
}

/// Records [`RxTimestamps`] while a response is being read.
#[derive(Debug, Default)]
pub(crate) struct RxClock {
    first: Option<SystemTime>,
    last: Option<SystemTime>,
}

impl RxClock {
    pub(crate) fn head(&mut self) {
        self.first = Some(SystemTime::now());
    }

    pub(crate) fn data(&mut self) {
        self.last = Some(SystemTime::now());
    }

    pub(crate) fn finish(self) -> Option<RxTimestamps> {
        let first = self.first?;
        Some(RxTimestamps {
            first,
            last: self.last.unwrap_or(first),
        })
    }
}

/// HTTP response with a fully buffered body.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    body: Bytes,
    http_version: HttpVersion,
    pub effective_url: Option<String>,
    timestamps: Option<RxTimestamps>,
}

impl Response {
    pub fn new(status: u16, headers: HeaderMap, body: Bytes, http_version: HttpVersion) -> Self {
        Self {
            status,
            headers,
            body,
            http_version,
            effective_url: None,
            timestamps: None,
        }
    }

    /// Set the effective URL (the URL that was actually requested).
    /// This is used by the redirect engine to track the current URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.effective_url = Some(url.into());
        self
    }

    pub(crate) fn with_timestamps(mut self, timestamps: Option<RxTimestamps>) -> Self {
        self.timestamps = timestamps;
        self
    }

    pub fn http_version(&self) -> HttpVersion { self.http_version }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn into_body(self) -> Bytes { self.body }
    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }
    pub fn is_redirect(&self) -> bool { (300..400).contains(&self.status) }
    pub fn redirect_url(&self) -> Option<&str> { self.get_header("Location") }

    /// Receive timestamps, present when the dispatcher captures them.
    pub fn timestamps(&self) -> Option<RxTimestamps> { self.timestamps }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn get_headers(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| Error::dispatch(format!("UTF-8 decode error: {}", e)))
    }
}
