//! BoringSSL handshake engine.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::raw::c_int;
use std::path::Path;
use std::sync::{Arc, Mutex};

use boring::ssl::{SslConnector, SslMethod, SslSessionCacheMode, SslVerifyMode, SslVersion};
use boring_sys::SSL_CTX;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::error::{Error, Result};
use crate::fingerprint::tls::TlsFingerprint;
use crate::transport::BoxedIo;
use crate::version::{HttpVersion, ALPN_H2, ALPN_HTTP1};

extern "C" {
    /// Enable GREASE (Generate Random Extensions And Sustain Extensibility)
    pub fn SSL_CTX_set_grease_enabled(ctx: *mut SSL_CTX, enabled: c_int) -> c_int;
    /// Enable extension order permutation (Chrome 110+ behavior)
    pub fn SSL_CTX_set_permute_extensions(ctx: *mut SSL_CTX, enabled: c_int) -> c_int;
}

/// Sink for TLS secrets in NSS key log format.
#[derive(Clone)]
pub struct KeyLog {
    file: Arc<Mutex<File>>,
}

impl KeyLog {
    /// Open (or create) a key log file for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(path).map_err(|e| {
            Error::configuration(format!(
                "failed to open key log file {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Append one key log line.
    pub fn write_line(&self, line: &str) {
        if let Ok(mut file) = self.file.lock() {
            if let Err(e) = writeln!(file, "{}", line) {
                tracing::warn!("Failed to write key log line: {}", e);
            }
        }
    }
}

impl fmt::Debug for KeyLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLog").finish_non_exhaustive()
    }
}

/// Per-handshake options.
#[derive(Debug, Clone, Default)]
pub struct HandshakeOptions {
    /// SNI and certificate name.
    pub server_name: String,
    /// Offered application protocols. Empty offers `h2` then `http/1.1`;
    /// a single entry forces that protocol.
    pub alpn: Vec<&'static str>,
    /// Skip certificate and hostname verification.
    pub insecure_skip_verify: bool,
    /// Where to log handshake secrets.
    pub key_log: Option<KeyLog>,
}

impl HandshakeOptions {
    /// ALPN protocols actually offered.
    pub fn offered_alpn(&self) -> Vec<&'static str> {
        if self.alpn.is_empty() {
            vec![ALPN_H2, ALPN_HTTP1]
        } else {
            self.alpn.clone()
        }
    }

    /// ALPN list in wire format (length-prefixed).
    pub fn alpn_wire(&self) -> Vec<u8> {
        let mut wire = Vec::new();
        for proto in self.offered_alpn() {
            wire.push(proto.len() as u8);
            wire.extend_from_slice(proto.as_bytes());
        }
        wire
    }
}

/// Connection whose handshake completed.
pub struct Negotiated {
    pub io: BoxedIo,
    pub version: HttpVersion,
}

impl fmt::Debug for Negotiated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Negotiated")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Performs a secure handshake on a raw connection and reports the
/// negotiated protocol.
///
/// On failure the raw connection must be closed (dropped) before returning.
pub trait Handshaker: Send + Sync + 'static {
    fn handshake<'a>(
        &'a self,
        io: BoxedIo,
        options: &'a HandshakeOptions,
    ) -> BoxFuture<'a, io::Result<Negotiated>>;
}

/// BoringSSL-based handshaker shaped by a [`TlsFingerprint`].
#[derive(Debug, Clone, Default)]
pub struct BoringHandshaker {
    fingerprint: TlsFingerprint,
}

impl BoringHandshaker {
    pub fn new(fingerprint: TlsFingerprint) -> Self {
        Self { fingerprint }
    }

    fn configure_ssl(&self, options: &HandshakeOptions) -> io::Result<SslConnector> {
        let mut builder = SslConnector::builder(SslMethod::tls_client()).map_err(io::Error::other)?;

        let fp = &self.fingerprint;
        if !fp.cipher_list.is_empty() {
            builder
                .set_cipher_list(&fp.cipher_list.join(":"))
                .map_err(io::Error::other)?;
        }
        if !fp.curves.is_empty() {
            builder
                .set_curves_list(&fp.curves.join(":"))
                .map_err(io::Error::other)?;
        }
        if !fp.sigalgs.is_empty() {
            builder
                .set_sigalgs_list(&fp.sigalgs.join(":"))
                .map_err(io::Error::other)?;
        }

        unsafe {
            let ctx = builder.as_ptr() as *mut SSL_CTX;
            SSL_CTX_set_grease_enabled(ctx, fp.grease as c_int);
            SSL_CTX_set_permute_extensions(ctx, fp.permute_extensions as c_int);
        }

        builder
            .set_min_proto_version(Some(SslVersion::TLS1_2))
            .map_err(io::Error::other)?;
        builder
            .set_max_proto_version(Some(SslVersion::TLS1_3))
            .map_err(io::Error::other)?;
        builder.set_session_cache_mode(SslSessionCacheMode::CLIENT);
        builder
            .set_alpn_protos(&options.alpn_wire())
            .map_err(io::Error::other)?;

        if options.insecure_skip_verify {
            builder.set_verify(SslVerifyMode::NONE);
        }
        if let Some(key_log) = options.key_log.clone() {
            builder.set_keylog_callback(move |_, line| key_log.write_line(line));
        }

        Ok(builder.build())
    }

    async fn connect(&self, io: BoxedIo, options: &HandshakeOptions) -> io::Result<Negotiated> {
        let connector = self.configure_ssl(options)?;
        let mut config = connector.configure().map_err(io::Error::other)?;
        if options.insecure_skip_verify {
            config.set_verify_hostname(false);
        }

        // The raw connection is owned by the handshake error and dropped with it.
        let stream = tokio_boring::connect(config, &options.server_name, io)
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::ConnectionAborted, e.to_string()))?;

        let version = HttpVersion::from_alpn(stream.ssl().selected_alpn_protocol());
        tracing::debug!(
            "TLS handshake with {} negotiated {}",
            options.server_name,
            version.as_str()
        );
        Ok(Negotiated {
            io: Box::new(stream),
            version,
        })
    }
}

impl Handshaker for BoringHandshaker {
    fn handshake<'a>(
        &'a self,
        io: BoxedIo,
        options: &'a HandshakeOptions,
    ) -> BoxFuture<'a, io::Result<Negotiated>> {
        self.connect(io, options).boxed()
    }
}
