//! TCP socket shaping for browser impersonation.
//!
//! Configures the socket options detectable before the TLS handshake
//! (p0f-style fingerprinting): buffer sizes, which drive the advertised window,
//! and the IPv4 TTL.

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{lookup_host, TcpStream};

/// TCP/IP fingerprint configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpFingerprint {
    /// Socket buffer size in bytes (influences the initial receive window).
    pub window_size: u32,
    /// Initial TTL for IPv4 packets. macOS/Linux: 64, Windows: 128.
    pub ttl: u8,
}

impl Default for TcpFingerprint {
    fn default() -> Self {
        // Chrome defaults on macOS
        Self {
            window_size: 65535,
            ttl: 64,
        }
    }
}

impl TcpFingerprint {
    /// Create Chrome TCP fingerprint.
    pub fn chrome() -> Self {
        Self::default()
    }

    /// Windows stack defaults.
    pub fn windows() -> Self {
        Self {
            ttl: 128,
            ..Self::default()
        }
    }
}

/// Configure a TCP socket with fingerprint settings.
///
/// MSS, window scaling, SACK and timestamps are negotiated by the OS stack and
/// cannot be set through portable socket options.
pub fn configure_tcp_socket(socket: &Socket, fp: &TcpFingerprint) -> io::Result<()> {
    socket.set_recv_buffer_size(fp.window_size as usize)?;
    socket.set_send_buffer_size(fp.window_size as usize)?;
    if socket.domain()? == Domain::IPV4 {
        socket.set_ttl_v4(fp.ttl as u32)?;
    }
    socket.set_tcp_nodelay(true)?;
    Ok(())
}

/// Resolve `addr` and connect with the given fingerprint applied before SYN.
pub async fn connect_shaped(addr: &str, fp: &TcpFingerprint) -> io::Result<TcpStream> {
    let socket_addr: SocketAddr = lookup_host(addr).await?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses found for {}", addr),
        )
    })?;

    let domain = match socket_addr {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };

    let fp = fp.clone();
    let std_stream = tokio::task::spawn_blocking(move || -> io::Result<std::net::TcpStream> {
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        configure_tcp_socket(&socket, &fp)?;
        socket.connect(&socket_addr.into())?;
        // tokio requires non-blocking sockets
        socket.set_nonblocking(true)?;
        Ok(socket.into())
    })
    .await
    .map_err(io::Error::other)??;

    TcpStream::from_std(std_stream)
}
