use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use wraith::transport::connector::Negotiated;
use wraith::{BoxedIo, HandshakeOptions, Handshaker, HttpVersion};

/// Handshake engine that performs no cryptography: it reports a fixed
/// negotiated protocol and passes the raw connection through, counting calls.
pub struct PassthroughHandshaker {
    calls: AtomicUsize,
    version: HttpVersion,
    delay: Duration,
    failures: AtomicUsize,
    seen: Mutex<Vec<HandshakeOptions>>,
}

impl PassthroughHandshaker {
    pub fn new(version: HttpVersion) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            version,
            delay: Duration::from_millis(50),
            failures: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Hold every handshake for `delay` before completing it.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next `n` handshakes.
    pub fn failing(self, n: usize) -> Self {
        self.failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Options passed to each handshake so far.
    pub fn seen(&self) -> Vec<HandshakeOptions> {
        self.seen.lock().unwrap().clone()
    }
}

impl Handshaker for PassthroughHandshaker {
    fn handshake<'a>(
        &'a self,
        io: BoxedIo,
        options: &'a HandshakeOptions,
    ) -> BoxFuture<'a, io::Result<Negotiated>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(options.clone());
            tokio::time::sleep(self.delay).await;

            let fail = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if fail {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    "handshake alert: handshake failure",
                ));
            }
            Ok(Negotiated {
                io,
                version: self.version,
            })
        }
        .boxed()
    }
}
