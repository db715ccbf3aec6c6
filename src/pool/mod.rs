//! Per-destination transport cache and handshake coordination.
//!
//! A destination moves `absent -> pending-handshake -> ready` exactly once;
//! [`HandshakeCoordinator`] drives the transition, [`TransportSelector`]
//! decides the protocol and [`ConnectionCache`] holds the result.

pub mod cache;
pub mod coordinator;
pub mod destination;
pub mod selector;

pub use cache::ConnectionCache;
pub use coordinator::{Acquired, ConnectionHook, Connector, HandshakeCoordinator, Need, Redial};
pub use destination::Destination;
pub use selector::TransportSelector;
