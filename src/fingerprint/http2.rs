//! HTTP/2 transport tuning.
//!
//! These values are fixed when a transport is built and never derived from the
//! connection that triggered the build.

use std::time::Duration;

/// Chrome's connection-level window: 65535 + WINDOW_UPDATE of 15663105.
pub const CONNECTION_WINDOW_SIZE: u32 = 15_728_640;

/// HTTP/2 SETTINGS applied to every HTTP/2 transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Http2Settings {
    pub header_table_size: u32,
    pub enable_push: bool,
    pub max_concurrent_streams: u32,
    pub initial_window_size: u32,
    pub initial_connection_window_size: u32,
    pub max_frame_size: u32,
    pub max_header_list_size: u32,
    /// Timeout for the HTTP/2 preface exchange on a fresh connection.
    pub handshake_timeout: Option<Duration>,
}

impl Default for Http2Settings {
    fn default() -> Self {
        Self {
            header_table_size: 65536,
            enable_push: false,
            max_concurrent_streams: 1000,
            initial_window_size: 6_291_456,
            initial_connection_window_size: CONNECTION_WINDOW_SIZE,
            max_frame_size: 16384,
            max_header_list_size: 262_144,
            handshake_timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl Http2Settings {
    /// Build an `h2` client builder carrying these settings.
    pub fn client_builder(&self) -> h2::client::Builder {
        let mut builder = h2::client::Builder::new();
        builder
            .header_table_size(self.header_table_size)
            .initial_window_size(self.initial_window_size)
            .initial_connection_window_size(self.initial_connection_window_size)
            .max_concurrent_streams(self.max_concurrent_streams)
            .max_frame_size(self.max_frame_size)
            .max_header_list_size(self.max_header_list_size)
            .enable_push(self.enable_push);
        builder
    }
}
