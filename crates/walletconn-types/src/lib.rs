//! walletconn Types - Canonical types for wallet connection sessions
//!
//! This crate contains the foundational types shared by the connector
//! contract and the connection manager, with zero dependencies on other
//! walletconn crates:
//!
//! - Chain identifiers and their normalization
//! - Connector update payloads (partial and resolved)
//! - Opaque provider and library handles
//! - The session error taxonomy
//!
//! # Chain-id normalization
//!
//! Wallets report chain ids as integers, decimal strings, or hex strings
//! (some mobile wallets even emit `"Ox1"`). [`normalize_chain_id`] is the one
//! place raw values become a [`ChainId`]; nothing else compares raw values.
//!
//! ```text
//! RawChainId ──normalize_chain_id──→ ChainId ──supported set check──→ ResolvedUpdate
//! ```

pub mod chain;
pub mod error;
pub mod handle;
pub mod update;

pub use chain::*;
pub use error::*;
pub use handle::*;
pub use update::*;

/// Version of the walletconn types schema
pub const TYPES_VERSION: &str = "0.1.0";
