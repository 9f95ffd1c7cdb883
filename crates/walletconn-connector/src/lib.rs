//! walletconn Connector - the capability contract a wallet integration implements
//!
//! A connector owns all communication with the wallet (browser extension,
//! mobile bridge, plain RPC). The connection manager only sees:
//!
//! - an async handshake ([`Connector::activate`]) and three field queries
//! - an optional supported-chain restriction
//! - a synchronous, idempotent [`Connector::deactivate`]
//! - lifecycle events through an [`EventEmitter`]
//!
//! [`InMemoryConnector`] is a scriptable implementation used by tests and the CLI.

pub mod connector;
pub mod events;
pub mod in_memory;

pub use connector::{same_connector, Connector, SharedConnector};
pub use events::{ConnectorEvent, ConnectorEventKind, EventEmitter, ListenerId, Subscription};
pub use in_memory::{HandshakeMode, InMemoryConnector};
