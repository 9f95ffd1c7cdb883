//! walletconn Core - connection lifecycle for pluggable wallet connectors
//!
//! [`ConnectionManager`] activates a connector, resolves and validates what
//! it reports, and keeps one shared [`ConnectionState`] record consistent
//! with the connector's asynchronous updates, errors and deactivation.
//!
//! # Architecture
//!
//! ```text
//! activate(connector) ──handshake──→ record connector ──→ resolve ──→ publish
//!                                          │
//!                                          └─ reconciler subscribes
//! connector events ──→ reconciler ──→ merge into ConnectionState ──→ watchers
//! deactivate() ──→ connector.deactivate() ──Deactivate event──→ reset
//! ```
//!
//! Every write is a field-wise merge, guarded so that writes from a stale
//! activation or from a connector that is no longer recorded are dropped.

pub mod config;
pub mod library;
pub mod manager;
mod reconciler;
pub mod resolve;
mod session;
pub mod state;

pub use config::ManagerConfig;
pub use library::{identity_library, library_transform, LibraryTransform};
pub use manager::{ActivateOptions, ConnectionManager, ErrorCallback};
pub use resolve::{ensure_supported, parse_update};
pub use state::{ConnectionState, StateSnapshot};

pub use walletconn_connector::{Connector, ConnectorEvent, ConnectorEventKind, SharedConnector};
pub use walletconn_types::{
    normalize_chain_id, Account, ChainId, ConnectorError, ConnectorUpdate, Library, Provider,
    RawChainId, ResolvedUpdate, SessionError,
};
