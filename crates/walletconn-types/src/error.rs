//! Error types for walletconn
//!
//! Errors end up stored in the shared connection state and handed to
//! caller callbacks, so every error here is `Clone`.

use thiserror::Error;

use crate::chain::ChainId;

/// Result type for walletconn operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Session error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// A chain id could not be parsed as a non-negative integer
    #[error("chainId {value} is not an integer")]
    InvalidChainId { value: String },

    /// The connector reported a chain outside its declared supported set
    #[error("Unsupported chain id: {chain_id}. Supported chain ids are: {}.", join_ids(.supported))]
    UnsupportedChainId {
        chain_id: ChainId,
        supported: Vec<ChainId>,
    },

    /// No library transform was registered before activation
    #[error("getLibrary isn't set")]
    LibraryTransformUnset,

    /// Error raised by the connector itself, passed through unchanged
    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

impl SessionError {
    /// Whether this is the unsupported-chain error a later update may recover from.
    pub fn is_unsupported_chain(&self) -> bool {
        matches!(self, Self::UnsupportedChainId { .. })
    }
}

fn join_ids(ids: &[ChainId]) -> String {
    ids.iter()
        .map(ChainId::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Opaque error originating from a connector (wallet extension, mobile
/// wallet bridge, RPC transport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConnectorError {
    pub message: String,
    /// EIP-1193 / JSON-RPC error code, when the wallet supplied one
    pub code: Option<i64>,
}

impl ConnectorError {
    /// EIP-1193 "user rejected the request"
    pub const USER_REJECTED: i64 = 4001;

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: i64) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }

    pub fn user_rejected() -> Self {
        Self::with_code("User rejected the request.", Self::USER_REJECTED)
    }

    pub fn is_user_rejected(&self) -> bool {
        self.code == Some(Self::USER_REJECTED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_chain_message_lists_supported_ids() {
        let err = SessionError::UnsupportedChainId {
            chain_id: ChainId(4),
            supported: vec![ChainId(1), ChainId(137)],
        };
        assert_eq!(
            err.to_string(),
            "Unsupported chain id: 4. Supported chain ids are: 1, 137."
        );
        assert!(err.is_unsupported_chain());
    }

    #[test]
    fn test_connector_error_passes_through() {
        let err: SessionError = ConnectorError::user_rejected().into();
        assert_eq!(err.to_string(), "User rejected the request.");
        match err {
            SessionError::Connector(inner) => assert!(inner.is_user_rejected()),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
