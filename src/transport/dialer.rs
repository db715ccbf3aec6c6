//! Raw connection dialers.

use std::io;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::net::TcpStream;

use crate::transport::tcp::{connect_shaped, TcpFingerprint};
use crate::transport::BoxedIo;

/// Opens a raw bidirectional byte stream to `host:port`.
///
/// Implementations may connect directly or tunnel through a proxy; the
/// dispatcher treats the result as opaque.
pub trait Dialer: Send + Sync + 'static {
    fn dial<'a>(&'a self, addr: &'a str) -> BoxFuture<'a, io::Result<BoxedIo>>;
}

/// Direct TCP dialer.
#[derive(Debug, Clone, Default)]
pub struct DirectDialer {
    tcp_fingerprint: Option<TcpFingerprint>,
}

impl DirectDialer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply TCP socket shaping to every dialed connection.
    pub fn with_tcp_fingerprint(mut self, fp: TcpFingerprint) -> Self {
        self.tcp_fingerprint = Some(fp);
        self
    }

    /// Connect and return the concrete stream.
    pub async fn connect(&self, addr: &str) -> io::Result<TcpStream> {
        match &self.tcp_fingerprint {
            Some(fp) => connect_shaped(addr, fp).await,
            None => {
                let stream = TcpStream::connect(addr).await?;
                stream.set_nodelay(true)?;
                Ok(stream)
            }
        }
    }
}

impl Dialer for DirectDialer {
    fn dial<'a>(&'a self, addr: &'a str) -> BoxFuture<'a, io::Result<BoxedIo>> {
        async move {
            let stream = self.connect(addr).await?;
            Ok(Box::new(stream) as BoxedIo)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_direct_dial_roundtrip_bytes() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            sock.read_exact(&mut buf).await.unwrap();
            sock.write_all(&buf).await.unwrap();
        });

        let mut io = DirectDialer::new().dial(&addr).await.unwrap();
        io.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        io.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn test_direct_dial_refused() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        assert!(DirectDialer::new().dial(&addr).await.is_err());
    }
}
