//! HTTP client on top of [`RoundTripper`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use http::{Method, Request};
use url::Url;

use crate::error::{Error, Result};
use crate::fingerprint::{FingerprintProfile, Http2Settings};
use crate::pool::ConnectionHook;
use crate::response::Response;
use crate::roundtripper::{DispatcherConfig, RoundTripper};
use crate::timeouts::{with_deadline, Timeouts};
use crate::transport::tcp::TcpFingerprint;
use crate::transport::{
    BoringHandshaker, Dialer, DirectDialer, HandshakeOptions, Handshaker, HttpConnectDialer,
    KeyLog,
};
use crate::version::ALPN_HTTP1;

/// Maximum number of redirects followed for one request.
pub const MAX_REDIRECTS: u32 = 10;

/// HTTP client with fingerprinted TLS and per-destination transport reuse.
#[derive(Clone, Debug)]
pub struct Client {
    round_tripper: Arc<RoundTripper>,
    user_agent: &'static str,
    follow_redirects: bool,
    timeouts: Timeouts,
}

/// Builder for HTTP requests.
pub struct RequestBuilder<'a> {
    client: &'a Client,
    url: String,
    method: Method,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
}

/// Builder for creating HTTP clients.
pub struct ClientBuilder {
    profile: FingerprintProfile,
    proxy: Option<Url>,
    follow_redirects: bool,
    insecure_skip_verify: bool,
    force_http1: bool,
    timeouts: Timeouts,
    key_log_file: Option<PathBuf>,
    rx_timestamps: bool,
    on_new_connection: Option<ConnectionHook>,
    dialer: Option<Arc<dyn Dialer>>,
    handshaker: Option<Arc<dyn Handshaker>>,
    tcp_fingerprint: Option<TcpFingerprint>,
    http2_settings: Http2Settings,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a GET request builder.
    pub fn get(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::GET, url)
    }

    /// Create a POST request builder.
    pub fn post(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::POST, url)
    }

    /// Create a custom method request builder.
    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder {
            client: self,
            url: url.into(),
            method,
            headers: Vec::new(),
            body: None,
        }
    }

    /// The dispatcher behind this client.
    pub fn round_tripper(&self) -> &RoundTripper {
        &self.round_tripper
    }

    async fn execute(
        &self,
        mut method: Method,
        mut url: Url,
        mut headers: Vec<(String, String)>,
        mut body: Option<Bytes>,
    ) -> Result<Response> {
        let mut redirects = 0u32;
        loop {
            let request = self.build_request(&method, &url, &headers, body.clone())?;
            let response = self
                .round_tripper
                .round_trip(request)
                .await?
                .with_url(url.as_str());

            if !self.follow_redirects {
                return Ok(response);
            }
            let rewrite_to_get = match response.status {
                301..=303 => true,
                307 | 308 => false,
                _ => return Ok(response),
            };
            let Some(location) = response.redirect_url() else {
                return Ok(response);
            };

            if redirects >= MAX_REDIRECTS {
                return Err(Error::RedirectLimit { count: redirects });
            }
            let next = url
                .join(location)
                .map_err(|e| Error::InvalidRedirectUrl(format!("{}: {}", location, e)))?;
            tracing::debug!("Following {} redirect to {}", response.status, next);

            if rewrite_to_get && method != Method::HEAD {
                method = Method::GET;
                body = None;
                headers.retain(|(name, _)| {
                    !name.eq_ignore_ascii_case(CONTENT_TYPE.as_str())
                        && !name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str())
                });
            }
            redirects += 1;
            url = next;
        }
    }

    fn build_request(
        &self,
        method: &Method,
        url: &Url,
        headers: &[(String, String)],
        body: Option<Bytes>,
    ) -> Result<Request<Bytes>> {
        let mut builder = Request::builder().method(method.clone()).uri(url.as_str());
        let header_map = builder
            .headers_mut()
            .ok_or_else(|| Error::configuration(format!("Invalid request URL: {}", url)))?;

        for (key, value) in headers {
            header_map.append(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|e| Error::configuration(format!("Invalid header name: {}", e)))?,
                HeaderValue::from_str(value)
                    .map_err(|e| Error::configuration(format!("Invalid header value: {}", e)))?,
            );
        }
        if !header_map.contains_key(USER_AGENT) {
            header_map.insert(USER_AGENT, HeaderValue::from_static(self.user_agent));
        }

        builder
            .body(body.unwrap_or_default())
            .map_err(|e| Error::configuration(format!("Failed to build request: {}", e)))
    }
}

impl<'a> RequestBuilder<'a> {
    /// Add a header to the request.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set all headers (replaces existing headers).
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Send the request and return the response.
    ///
    /// The client's total timeout covers redirects and any wait on a shared
    /// handshake; expiry abandons only this request.
    pub async fn send(self) -> Result<Response> {
        let url = Url::parse(&self.url)?;
        let client = self.client;
        with_deadline(
            client.timeouts.total,
            client.execute(self.method, url, self.headers, self.body),
            Error::Timeout,
        )
        .await
    }
}

impl ClientBuilder {
    /// Create a new client builder with default settings.
    pub fn new() -> Self {
        Self {
            profile: FingerprintProfile::default(),
            proxy: None,
            follow_redirects: true,
            insecure_skip_verify: false,
            force_http1: false,
            timeouts: Timeouts::default(),
            key_log_file: None,
            rx_timestamps: false,
            on_new_connection: None,
            dialer: None,
            handshaker: None,
            tcp_fingerprint: None,
            http2_settings: Http2Settings::default(),
        }
    }

    /// Set the handshake profile.
    pub fn profile(mut self, profile: FingerprintProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Tunnel every connection through an HTTP proxy. Takes precedence over
    /// [`Self::dialer`].
    pub fn proxy(mut self, proxy: Url) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Follow redirects (default: true, at most [`MAX_REDIRECTS`]).
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Skip certificate and hostname verification.
    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }

    /// Offer only `http/1.1` during the handshake.
    pub fn force_http1(mut self, force: bool) -> Self {
        self.force_http1 = force;
        self
    }

    /// Set total request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeouts = self.timeouts.total(timeout);
        self
    }

    /// Set dial + handshake timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts = self.timeouts.connect(timeout);
        self
    }

    /// Replace all timeouts.
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Append TLS secrets to `path` in NSS key log format.
    pub fn key_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_log_file = Some(path.into());
        self
    }

    /// Attach receive timestamps to every response.
    pub fn rx_timestamps(mut self, enabled: bool) -> Self {
        self.rx_timestamps = enabled;
        self
    }

    /// Called with `(network, addr)` when a coordinated handshake starts.
    pub fn on_new_connection<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.on_new_connection = Some(Arc::new(hook));
        self
    }

    /// Use a custom dialer for raw connections.
    pub fn dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    /// Use a custom handshake engine instead of BoringSSL.
    pub fn handshaker(mut self, handshaker: Arc<dyn Handshaker>) -> Self {
        self.handshaker = Some(handshaker);
        self
    }

    /// Shape TCP sockets opened by the built-in dialers.
    pub fn tcp_fingerprint(mut self, fp: TcpFingerprint) -> Self {
        self.tcp_fingerprint = Some(fp);
        self
    }

    /// Override the HTTP/2 settings.
    pub fn http2_settings(mut self, settings: Http2Settings) -> Self {
        self.http2_settings = settings;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client> {
        let dialer: Arc<dyn Dialer> = match (&self.proxy, self.dialer) {
            (Some(proxy), _) => {
                let mut dialer = HttpConnectDialer::new(proxy)?;
                if let Some(fp) = self.tcp_fingerprint.clone() {
                    dialer = dialer.with_tcp_fingerprint(fp);
                }
                Arc::new(dialer)
            }
            (None, Some(dialer)) => dialer,
            (None, None) => {
                let mut dialer = DirectDialer::new();
                if let Some(fp) = self.tcp_fingerprint.clone() {
                    dialer = dialer.with_tcp_fingerprint(fp);
                }
                Arc::new(dialer)
            }
        };

        let handshaker = self
            .handshaker
            .unwrap_or_else(|| Arc::new(BoringHandshaker::new(self.profile.tls_fingerprint())));

        let key_log = self.key_log_file.as_ref().map(KeyLog::open).transpose()?;
        let handshake = HandshakeOptions {
            server_name: String::new(),
            alpn: if self.force_http1 {
                vec![ALPN_HTTP1]
            } else {
                Vec::new()
            },
            insecure_skip_verify: self.insecure_skip_verify,
            key_log,
        };

        let round_tripper = RoundTripper::new(DispatcherConfig {
            dialer,
            handshaker,
            handshake,
            connect_timeout: self.timeouts.connect,
            rx_timestamps: self.rx_timestamps,
            on_new_connection: self.on_new_connection,
            http2: self.http2_settings,
        });

        Ok(Client {
            round_tripper: Arc::new(round_tripper),
            user_agent: self.profile.user_agent(),
            follow_redirects: self.follow_redirects,
            timeouts: self.timeouts,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
