use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use boring::ssl::SslAcceptor;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::{http1, http2};
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

pub type Handler = Arc<
    dyn Fn(Request<Incoming>) -> BoxFuture<'static, io::Result<Response<Full<Bytes>>>>
        + Send
        + Sync,
>;

/// Wire protocol spoken by a [`MockServer`] on plain TCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proto {
    Http1,
    /// HTTP/2 with prior knowledge.
    H2,
}

/// In-process hyper server on 127.0.0.1 counting accepted TCP connections.
pub struct MockServer {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    kill: broadcast::Sender<()>,
}

impl MockServer {
    /// Serve `proto` on plain TCP.
    pub async fn start(proto: Proto, handler: Handler) -> Self {
        Self::spawn(handler, move |stream, handler| {
            async move { serve(proto, stream, handler).await }.boxed()
        })
        .await
    }

    /// Serve over TLS; the protocol follows the ALPN the acceptor selected.
    pub async fn start_tls(acceptor: SslAcceptor, handler: Handler) -> Self {
        let acceptor = Arc::new(acceptor);
        Self::spawn(handler, move |stream, handler| {
            let acceptor = acceptor.clone();
            async move {
                let stream = match tokio_boring::accept(&acceptor, stream).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        tracing::debug!("mock TLS accept failed: {}", e);
                        return;
                    }
                };
                let proto = match stream.ssl().selected_alpn_protocol() {
                    Some(b"h2") => Proto::H2,
                    _ => Proto::Http1,
                };
                serve(proto, stream, handler).await
            }
            .boxed()
        })
        .await
    }

    async fn spawn<F>(handler: Handler, on_accept: F) -> Self
    where
        F: Fn(tokio::net::TcpStream, Handler) -> BoxFuture<'static, ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));

        let (kill, _) = broadcast::channel(1);

        let counter = connections.clone();
        let killer = kill.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let connection = on_accept(stream, handler.clone());
                let mut killed = killer.subscribe();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = connection => {}
                        _ = killed.recv() => {}
                    }
                });
            }
        });

        Self {
            addr,
            connections,
            kill,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn url(&self, scheme: &str, path: &str) -> String {
        format!("{}://127.0.0.1:{}{}", scheme, self.addr.port(), path)
    }

    /// Abruptly close every open connection.
    pub fn drop_connections(&self) {
        let _ = self.kill.send(());
    }

    /// TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn serve<S>(proto: Proto, stream: S, handler: Handler)
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| handler(req));
    let result = match proto {
        Proto::Http1 => http1::Builder::new().serve_connection(io, service).await,
        Proto::H2 => {
            http2::Builder::new(TokioExecutor::new())
                .serve_connection(io, service)
                .await
        }
    };
    if let Err(e) = result {
        tracing::debug!("mock connection ended: {}", e);
    }
}

/// Handler answering every request with `200` and `body`.
pub fn ok(body: &'static str) -> Handler {
    Arc::new(move |_req: Request<Incoming>| {
        async move { Ok::<_, io::Error>(Response::new(Full::new(Bytes::from(body)))) }.boxed()
    })
}

/// Handler echoing `METHOD path body`.
pub fn echo() -> Handler {
    Arc::new(|req: Request<Incoming>| {
        async move {
            let method = req.method().clone();
            let path = req.uri().path().to_string();
            let body = req
                .into_body()
                .collect()
                .await
                .map_err(io::Error::other)?
                .to_bytes();
            let text = format!("{} {} {}", method, path, String::from_utf8_lossy(&body));
            Ok::<_, io::Error>(Response::new(Full::new(Bytes::from(text))))
        }
        .boxed()
    })
}

/// Handler that fails (stream reset / connection close) for `/fail` and
/// answers `ok` otherwise.
pub fn fail_on_path() -> Handler {
    Arc::new(|req: Request<Incoming>| {
        async move {
            if req.uri().path() == "/fail" {
                return Err(io::Error::other("handler failure"));
            }
            Ok::<_, io::Error>(Response::new(Full::new(Bytes::from_static(b"ok"))))
        }
        .boxed()
    })
}
