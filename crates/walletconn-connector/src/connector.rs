//! Connector capability contract

use std::sync::Arc;

use async_trait::async_trait;
use walletconn_types::{ChainId, ConnectorError, ConnectorUpdate, Provider, RawChainId};

use crate::events::EventEmitter;

/// A wallet / provider integration.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Human-readable name, used in logs
    fn name(&self) -> &str;

    /// Connector-specific handshake. May report any subset of the fields.
    async fn activate(&self) -> Result<ConnectorUpdate, ConnectorError>;

    async fn get_provider(&self) -> Result<Provider, ConnectorError>;

    async fn get_chain_id(&self) -> Result<RawChainId, ConnectorError>;

    /// `Ok(None)` means the wallet explicitly exposes no account.
    async fn get_account(&self) -> Result<Option<String>, ConnectorError>;

    /// Chains this connector accepts. `None` means no restriction.
    fn supported_chain_ids(&self) -> Option<&[ChainId]> {
        None
    }

    /// Release the wallet session. Must be a no-op on an inactive connector.
    fn deactivate(&self);

    /// Lifecycle event source
    fn events(&self) -> &EventEmitter;
}

pub type SharedConnector = Arc<dyn Connector>;

/// Connector identity: two handles are the same connector when they point
/// at the same allocation.
pub fn same_connector(a: &SharedConnector, b: &SharedConnector) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryConnector;

    #[test]
    fn test_same_connector_is_pointer_identity() {
        let a: SharedConnector = Arc::new(InMemoryConnector::new("injected"));
        let b: SharedConnector = Arc::new(InMemoryConnector::new("injected"));
        assert!(same_connector(&a, &a.clone()));
        assert!(!same_connector(&a, &b));
    }
}
