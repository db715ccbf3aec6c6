//! Coordinated dial + handshake per destination.
//!
//! At most one handshake ticket exists per destination. The first caller
//! creates it and the handshake runs in its own task; later callers attach to
//! the same shared outcome. Dropping a waiter never cancels the handshake.
//!
//! On success the task installs a transport (if the destination has none) and
//! parks the live connection in the destination's pending slot, so the first
//! request on the new transport reuses it instead of dialing again.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::pool::cache::{ConnectionCache, Ticket};
use crate::pool::destination::Destination;
use crate::pool::selector::TransportSelector;
use crate::timeouts::with_deadline;
use crate::transport::connector::Negotiated;
use crate::transport::{BoxedIo, Dialer, HandshakeOptions, Handshaker};
use crate::version::HttpVersion;

/// Callback invoked as `(network, addr)` when a coordinated handshake starts.
pub type ConnectionHook = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Dial + handshake collaborators.
#[derive(Clone)]
pub struct Connector {
    pub dialer: Arc<dyn Dialer>,
    pub handshaker: Arc<dyn Handshaker>,
    /// Template options; an empty `server_name` is filled per destination.
    pub options: HandshakeOptions,
    pub on_new_connection: Option<ConnectionHook>,
    /// Deadline for dial + handshake together.
    pub connect_timeout: Option<Duration>,
}

impl Connector {
    async fn connect(&self, dest: &Destination) -> Result<Negotiated> {
        let addr = dest.addr();
        let mut options = self.options.clone();
        if options.server_name.is_empty() {
            options.server_name = dest.server_name().to_string();
        }

        with_deadline(
            self.connect_timeout,
            async {
                let io = self
                    .dialer
                    .dial(&addr)
                    .await
                    .map_err(|e| Error::dial(&addr, e))?;
                self.handshaker
                    .handshake(io, &options)
                    .await
                    .map_err(|e| Error::handshake(&addr, e))
            },
            Error::ConnectTimeout,
        )
        .await
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("options", &self.options)
            .field("connect_timeout", &self.connect_timeout)
            .field("on_new_connection", &self.on_new_connection.is_some())
            .finish_non_exhaustive()
    }
}

/// What the caller of [`HandshakeCoordinator::acquire`] needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Need {
    /// A ready transport; the handshake connection goes to its pending slot.
    Transport,
    /// A live connection for an existing transport.
    Connection,
}

/// Result of [`HandshakeCoordinator::acquire`].
///
/// `connection` is only ever set for one caller per handshake.
pub struct Acquired {
    pub version: HttpVersion,
    pub connection: Option<BoxedIo>,
}

impl fmt::Debug for Acquired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acquired")
            .field("version", &self.version)
            .field("connection", &self.connection.is_some())
            .finish()
    }
}

enum Joined {
    Done(Acquired),
    Wait {
        ticket: Ticket,
        hand_off: Option<oneshot::Receiver<BoxedIo>>,
    },
}

/// Deduplicates concurrent handshakes to the same destination.
pub struct HandshakeCoordinator {
    cache: Arc<ConnectionCache>,
    connector: Connector,
    selector: TransportSelector,
    next_ticket: AtomicU64,
    me: Weak<HandshakeCoordinator>,
}

impl HandshakeCoordinator {
    pub fn new(
        cache: Arc<ConnectionCache>,
        connector: Connector,
        selector: TransportSelector,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            cache,
            connector,
            selector,
            next_ticket: AtomicU64::new(1),
            me: me.clone(),
        })
    }

    pub fn cache(&self) -> &Arc<ConnectionCache> {
        &self.cache
    }

    pub fn selector(&self) -> &TransportSelector {
        &self.selector
    }

    /// Bring `dest` to the state `need` asks for, running or joining the
    /// destination's handshake if necessary.
    ///
    /// Handshake errors are shared by every caller attached to the failed
    /// ticket; the ticket is retired first, so the next call starts fresh.
    pub async fn acquire(&self, dest: &Destination, need: Need) -> Result<Acquired> {
        let (ticket, hand_off) = match self.join(dest, need).await? {
            Joined::Done(acquired) => return Ok(acquired),
            Joined::Wait { ticket, hand_off } => (ticket, hand_off),
        };

        let version = ticket.outcome.await?;
        let connection = match hand_off {
            Some(rx) => rx.await.ok(),
            None => None,
        };
        Ok(Acquired {
            version,
            connection,
        })
    }

    /// Obtain a live connection for a transport that already exists.
    ///
    /// Takes the pending connection when there is one, otherwise runs (or
    /// waits for) a coordinated handshake.
    pub async fn connection(&self, dest: &Destination) -> Result<BoxedIo> {
        loop {
            if let Some(io) = self.acquire(dest, Need::Connection).await?.connection {
                return Ok(io);
            }
            tracing::debug!(
                "Coordinator: connection for {} went to another caller, retrying",
                dest
            );
        }
    }

    async fn join(&self, dest: &Destination, need: Need) -> Result<Joined> {
        let mut slots = self.cache.slots().await;

        if need == Need::Transport {
            if let Some(transport) = self.cache.transport(dest).await {
                return Ok(Joined::Done(Acquired {
                    version: transport.version(),
                    connection: None,
                }));
            }
        }

        let slot = slots.entry(dest.clone()).or_default();
        if need == Need::Connection {
            if let Some(io) = slot.pending.take() {
                tracing::debug!("Coordinator: reusing pending connection for {}", dest);
                let version = self
                    .cache
                    .transport(dest)
                    .await
                    .map(|t| t.version())
                    .unwrap_or_default();
                return Ok(Joined::Done(Acquired {
                    version,
                    connection: Some(io),
                }));
            }
        }

        if let Some(ticket) = &slot.ticket {
            tracing::debug!(
                "Coordinator: joining handshake #{} for {}",
                ticket.id,
                dest
            );
            return Ok(Joined::Wait {
                ticket: ticket.clone(),
                hand_off: None,
            });
        }

        let this = self
            .me
            .upgrade()
            .ok_or_else(|| Error::dispatch("dispatcher dropped"))?;
        let id = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = match need {
            Need::Connection => {
                let (tx, rx) = oneshot::channel();
                (Some(tx), Some(rx))
            }
            Need::Transport => (None, None),
        };

        tracing::debug!("Coordinator: starting handshake #{} for {}", id, dest);
        let task_dest = dest.clone();
        let handle = tokio::spawn(async move {
            let run = AssertUnwindSafe(this.clone().run_ticket(id, task_dest.clone(), tx));
            match run.catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    // A panicking hook, dialer or handshaker must not leave the
                    // ticket behind for every later caller to join.
                    if let Some(slot) = this.cache.slots().await.get_mut(&task_dest) {
                        slot.retire(id);
                    }
                    let message = panic_message(panic.as_ref());
                    tracing::warn!("Handshake #{} for {} panicked: {}", id, task_dest, message);
                    Err(Error::handshake(
                        task_dest.addr(),
                        format!("handshake task panicked: {}", message),
                    ))
                }
            }
        });

        let addr = dest.addr();
        let outcome = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(Error::handshake(addr, format!("handshake task failed: {}", e))),
            }
        }
        .boxed()
        .shared();

        let ticket = Ticket { id, outcome };
        slot.ticket = Some(ticket.clone());
        Ok(Joined::Wait {
            ticket,
            hand_off: rx,
        })
    }

    /// Body of one ticket. Runs detached from every waiter.
    async fn run_ticket(
        self: Arc<Self>,
        id: u64,
        dest: Destination,
        hand_off: Option<oneshot::Sender<BoxedIo>>,
    ) -> Result<HttpVersion> {
        let addr = dest.addr();
        if let Some(hook) = &self.connector.on_new_connection {
            hook("tcp", &addr);
        }

        tracing::debug!("ConnectStart tcp {}", addr);
        let result = self.connector.connect(&dest).await;
        match &result {
            Ok(negotiated) => tracing::debug!(
                "ConnectDone tcp {} negotiated {}",
                addr,
                negotiated.version.as_str()
            ),
            Err(e) => tracing::warn!("ConnectDone tcp {} failed: {}", addr, e),
        }

        let mut slots = self.cache.slots().await;
        let slot = slots.entry(dest.clone()).or_default();
        slot.retire(id);
        let Negotiated { io, version } = result?;

        let mut transports = self.cache.transports_mut().await;
        if transports.contains_key(&dest) {
            match hand_off {
                Some(tx) => {
                    if let Err(io) = tx.send(io) {
                        slot.stash(&dest, io);
                    }
                }
                None => slot.stash(&dest, io),
            }
        } else {
            let transport = self
                .selector
                .select(version, Redial::new(self.me.clone(), dest.clone()));
            tracing::debug!(
                "Coordinator: selected {} transport for {}",
                version.as_str(),
                dest
            );
            transports.insert(dest.clone(), Arc::new(transport));
            slot.stash(&dest, io);
        }
        Ok(version)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl fmt::Debug for HandshakeCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeCoordinator")
            .field("connector", &self.connector)
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

/// Connection source for TLS transports: every new connection goes through
/// the coordinator of the dispatcher that built the transport.
#[derive(Clone)]
pub struct Redial {
    coordinator: Weak<HandshakeCoordinator>,
    dest: Destination,
}

impl Redial {
    pub(crate) fn new(coordinator: Weak<HandshakeCoordinator>, dest: Destination) -> Self {
        Self { coordinator, dest }
    }

    pub fn destination(&self) -> &Destination {
        &self.dest
    }

    /// Obtain a connection: the pending one if present, else a coordinated
    /// handshake.
    pub async fn connect(&self) -> Result<BoxedIo> {
        let coordinator = self
            .coordinator
            .upgrade()
            .ok_or_else(|| Error::dispatch("dispatcher dropped"))?;
        coordinator.connection(&self.dest).await
    }
}

impl fmt::Debug for Redial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redial").field("dest", &self.dest).finish()
    }
}
