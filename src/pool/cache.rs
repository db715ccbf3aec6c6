//! Per-destination transport cache.
//!
//! Each destination moves through `absent -> pending-handshake -> ready`.
//! Ready transports sit in a read-mostly map so dispatch to a ready destination
//! only takes a shared lock. The in-flight ticket and the pending connection
//! sit in a [`Slot`] under a separate mutex; transitions hold the slot mutex
//! first and the transport map second, never the other way around.
//!
//! Entries are never evicted; they live as long as the cache.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::{BoxFuture, Shared};
use tokio::sync::{Mutex, MutexGuard, RwLock, RwLockWriteGuard};

use crate::error::Result;
use crate::pool::destination::Destination;
use crate::transport::{BoxedIo, Transport};
use crate::version::HttpVersion;

/// Shared outcome of one coordinated handshake.
pub(crate) type TicketOutcome = Shared<BoxFuture<'static, Result<HttpVersion>>>;

/// In-flight handshake for one destination.
#[derive(Clone)]
pub(crate) struct Ticket {
    pub(crate) id: u64,
    pub(crate) outcome: TicketOutcome,
}

/// Handshake bookkeeping for one destination.
#[derive(Default)]
pub(crate) struct Slot {
    /// At most one handshake in flight.
    pub(crate) ticket: Option<Ticket>,
    /// Handshake-complete connection waiting for its first request.
    pub(crate) pending: Option<BoxedIo>,
}

impl Slot {
    /// Store a connection in the one-shot pending slot.
    pub(crate) fn stash(&mut self, dest: &Destination, io: BoxedIo) {
        if self.pending.replace(io).is_some() {
            tracing::debug!("Cache: replaced unused pending connection for {}", dest);
        }
    }

    /// Clear the ticket if it is still the one identified by `id`.
    pub(crate) fn retire(&mut self, id: u64) -> bool {
        match &self.ticket {
            Some(ticket) if ticket.id == id => {
                self.ticket = None;
                true
            }
            _ => false,
        }
    }
}

pub(crate) type Slots = HashMap<Destination, Slot>;
pub(crate) type Transports = HashMap<Destination, Arc<Transport>>;

/// Destination-keyed transport cache.
#[derive(Default)]
pub struct ConnectionCache {
    transports: RwLock<Transports>,
    slots: Mutex<Slots>,
}

impl ConnectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached transport for `dest`, if the destination is ready.
    pub async fn transport(&self, dest: &Destination) -> Option<Arc<Transport>> {
        self.transports.read().await.get(dest).cloned()
    }

    /// Return the cached transport or install the one produced by `build`.
    ///
    /// Used for plain destinations, which have no handshake phase.
    pub async fn get_or_insert_with(
        &self,
        dest: &Destination,
        build: impl FnOnce() -> Transport,
    ) -> Arc<Transport> {
        let mut transports = self.transports.write().await;
        Arc::clone(transports.entry(dest.clone()).or_insert_with(|| {
            let transport = Arc::new(build());
            tracing::debug!(
                "Cache: installed {} transport for {}",
                transport.version().as_str(),
                dest
            );
            transport
        }))
    }

    /// Take the pending connection for `dest`, leaving the slot empty.
    pub async fn take_pending(&self, dest: &Destination) -> Option<BoxedIo> {
        let mut slots = self.slots.lock().await;
        let io = slots.get_mut(dest).and_then(|s| s.pending.take());
        if io.is_some() {
            tracing::debug!("Cache: handing pending connection for {} to transport", dest);
        }
        io
    }

    /// Whether `dest` has a pending connection.
    pub async fn has_pending(&self, dest: &Destination) -> bool {
        let slots = self.slots.lock().await;
        slots.get(dest).is_some_and(|s| s.pending.is_some())
    }

    /// Whether a handshake for `dest` is in flight.
    pub async fn has_ticket(&self, dest: &Destination) -> bool {
        let slots = self.slots.lock().await;
        slots.get(dest).is_some_and(|s| s.ticket.is_some())
    }

    /// Number of destinations with a cached transport.
    pub async fn len(&self) -> usize {
        self.transports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Lock the handshake slots. Take this before [`Self::transports_mut`].
    pub(crate) async fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().await
    }

    /// Exclusive access to the transport map.
    pub(crate) async fn transports_mut(&self) -> RwLockWriteGuard<'_, Transports> {
        self.transports.write().await
    }
}
