//! Connector update payloads and account state

use serde::{Deserialize, Serialize};

use crate::chain::{ChainId, RawChainId};
use crate::handle::Provider;

/// A partial update reported by a connector.
///
/// Each field is optional; missing fields are queried from the connector
/// when the update is resolved. For `account`, the outer `Option` is
/// "reported or not", the inner one is "an address or explicitly none".
#[derive(Debug, Clone, Default)]
pub struct ConnectorUpdate {
    pub provider: Option<Provider>,
    pub chain_id: Option<RawChainId>,
    pub account: Option<Option<String>>,
}

impl ConnectorUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_chain_id(mut self, chain_id: impl Into<RawChainId>) -> Self {
        self.chain_id = Some(chain_id.into());
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(Some(account.into()));
        self
    }

    /// Report that the wallet has no account exposed.
    pub fn without_account(mut self) -> Self {
        self.account = Some(None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.provider.is_none() && self.chain_id.is_none() && self.account.is_none()
    }
}

/// An update with every field resolved and the chain id normalized.
#[derive(Debug, Clone)]
pub struct ResolvedUpdate {
    pub provider: Provider,
    pub chain_id: ChainId,
    pub account: Option<String>,
}

/// What the session knows about the wallet account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "address")]
pub enum Account {
    /// Not yet known
    #[default]
    Unknown,
    /// Known to be absent (locked wallet, unsupported chain)
    None,
    /// A wallet address
    Address(String),
}

impl Account {
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Address(address) => Some(address.as_str()),
            _ => None,
        }
    }

    pub fn is_address(&self) -> bool {
        matches!(self, Self::Address(_))
    }
}

impl From<Option<String>> for Account {
    fn from(account: Option<String>) -> Self {
        match account {
            Some(address) => Self::Address(address),
            None => Self::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_builder_tracks_reported_fields() {
        let update = ConnectorUpdate::new().with_chain_id("0x1");
        assert!(update.account.is_none());
        assert!(update.provider.is_none());
        assert!(!update.is_empty());

        let update = ConnectorUpdate::new().without_account();
        assert_eq!(update.account, Some(None));
        assert!(ConnectorUpdate::new().is_empty());
    }

    #[test]
    fn test_account_from_resolved_value() {
        assert_eq!(Account::from(Some("0xabc".to_string())).address(), Some("0xabc"));
        assert_eq!(Account::from(None), Account::None);
        assert!(!Account::Unknown.is_address());
    }

    #[test]
    fn test_account_serializes_with_status() {
        let json = serde_json::to_value(Account::Address("0xabc".into())).unwrap();
        assert_eq!(json, serde_json::json!({"status": "address", "address": "0xabc"}));
        let json = serde_json::to_value(Account::None).unwrap();
        assert_eq!(json, serde_json::json!({"status": "none"}));
    }
}
