//! # Wraith
//!
//! Connection dispatcher for an HTTP client with BoringSSL TLS fingerprinting.
//!
//! For each destination, the first secure request runs one coordinated
//! handshake. The negotiated ALPN decides whether HTTP/2 or HTTP/1.1 serves
//! that destination from then on, and the handshake's connection carries the
//! first request. Concurrent first requests share the same handshake.
//!
//! ```no_run
//! # async fn example() -> wraith::Result<()> {
//! let client = wraith::Client::builder().build()?;
//! let response = client.get("https://example.com/").send().await?;
//! println!("{} over {}", response.status, response.http_version().as_str());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod fingerprint;
pub mod pool;
pub mod response;
pub mod roundtripper;
pub mod timeouts;
pub mod transport;
pub mod version;

// Re-exports
pub use client::{Client, ClientBuilder, RequestBuilder};
pub use error::{Error, Phase, Result};
pub use fingerprint::FingerprintProfile;
pub use pool::Destination;
pub use response::{Response, RxTimestamps};
pub use roundtripper::{DispatcherConfig, RoundTripper};
pub use timeouts::Timeouts;
pub use transport::{
    BoringHandshaker, BoxedIo, Dialer, DirectDialer, HandshakeOptions, Handshaker,
    HttpConnectDialer, Transport,
};
pub use version::HttpVersion;
