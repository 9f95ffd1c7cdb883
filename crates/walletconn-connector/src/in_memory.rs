//! Scriptable in-memory connector
//!
//! Behaves like an injected browser wallet whose answers are set up front
//! and changed at runtime from test or demo code. Runtime changes are
//! reported through the connector's event emitter, the way a real wallet
//! reports `chainChanged` / `accountsChanged` / `disconnect`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use walletconn_types::{ChainId, ConnectorError, ConnectorUpdate, Provider, RawChainId};

use crate::connector::Connector;
use crate::events::EventEmitter;

/// What the handshake reports directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeMode {
    /// Provider, chain id and account
    Full,
    /// Provider only; chain id and account must be queried
    ProviderOnly,
    /// Nothing; every field must be queried
    Empty,
}

#[derive(Debug)]
struct WalletScript {
    provider: Provider,
    chain_id: RawChainId,
    account: Option<String>,
    handshake: HandshakeMode,
    handshake_delay: Option<Duration>,
    query_delay: Option<Duration>,
    rejection: Option<ConnectorError>,
    query_failure: Option<ConnectorError>,
    active: bool,
}

pub struct InMemoryConnector {
    name: String,
    supported: Option<Vec<ChainId>>,
    script: Mutex<WalletScript>,
    events: EventEmitter,
    activations: AtomicUsize,
    deactivations: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl InMemoryConnector {
    /// A wallet on mainnet with a single account.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            supported: None,
            script: Mutex::new(WalletScript {
                provider: Provider::new(format!("{}-provider", name)),
                chain_id: RawChainId::Text("0x1".to_string()),
                account: Some("0x0000000000000000000000000000000000000001".to_string()),
                handshake: HandshakeMode::Full,
                handshake_delay: None,
                query_delay: None,
                rejection: None,
                query_failure: None,
                active: false,
            }),
            name,
            events: EventEmitter::new(),
            activations: AtomicUsize::new(0),
            deactivations: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    // ── Setup ────────────────────────────────────────────────────────────────

    pub fn with_provider(self, provider: Provider) -> Self {
        self.script.lock().provider = provider;
        self
    }

    pub fn with_chain_id(self, chain_id: impl Into<RawChainId>) -> Self {
        self.script.lock().chain_id = chain_id.into();
        self
    }

    pub fn with_account(self, account: Option<&str>) -> Self {
        self.script.lock().account = account.map(str::to_string);
        self
    }

    pub fn with_supported_chain_ids(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.supported = Some(ids.into_iter().map(ChainId).collect());
        self
    }

    pub fn with_handshake(self, mode: HandshakeMode) -> Self {
        self.script.lock().handshake = mode;
        self
    }

    pub fn with_handshake_delay(self, delay: Duration) -> Self {
        self.script.lock().handshake_delay = Some(delay);
        self
    }

    pub fn with_query_delay(self, delay: Duration) -> Self {
        self.script.lock().query_delay = Some(delay);
        self
    }

    /// Make the handshake fail, as when the user dismisses the wallet prompt.
    pub fn rejecting(self, error: ConnectorError) -> Self {
        self.script.lock().rejection = Some(error);
        self
    }

    // ── Runtime changes ──────────────────────────────────────────────────────

    /// Switch networks and report only the new chain id.
    pub fn switch_chain(&self, chain_id: impl Into<RawChainId>) {
        let chain_id = chain_id.into();
        self.script.lock().chain_id = chain_id.clone();
        self.events.emit_update(ConnectorUpdate::new().with_chain_id(chain_id));
    }

    /// Change (or lock away) the account and report only the account.
    pub fn switch_account(&self, account: Option<&str>) {
        let account = account.map(str::to_string);
        self.script.lock().account = account.clone();
        self.events.emit_update(ConnectorUpdate {
            account: Some(account),
            ..ConnectorUpdate::default()
        });
    }

    /// Make subsequent field queries fail (or succeed again with `None`).
    pub fn fail_queries(&self, failure: Option<ConnectorError>) {
        self.script.lock().query_failure = failure;
    }

    /// Wallet-initiated disconnect.
    pub fn disconnect(&self) {
        self.deactivate();
    }

    // ── Inspection ───────────────────────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.script.lock().active
    }

    pub fn activation_count(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    /// Deactivations that actually released an active session.
    pub fn deactivation_count(&self) -> usize {
        self.deactivations.load(Ordering::SeqCst)
    }

    /// Highest number of field queries that were running at the same time.
    pub fn peak_concurrent_queries(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn provider(&self) -> Provider {
        self.script.lock().provider.clone()
    }

    async fn query<T>(&self, read: impl FnOnce(&WalletScript) -> T) -> Result<T, ConnectorError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.script.lock().query_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let script = self.script.lock();
            match &script.query_failure {
                Some(failure) => Err(failure.clone()),
                None => Ok(read(&script)),
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn activate(&self) -> Result<ConnectorUpdate, ConnectorError> {
        let delay = self.script.lock().handshake_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock();
        if let Some(rejection) = &script.rejection {
            return Err(rejection.clone());
        }
        script.active = true;
        self.activations.fetch_add(1, Ordering::SeqCst);

        let update = ConnectorUpdate::new();
        Ok(match script.handshake {
            HandshakeMode::Full => ConnectorUpdate {
                provider: Some(script.provider.clone()),
                chain_id: Some(script.chain_id.clone()),
                account: Some(script.account.clone()),
            },
            HandshakeMode::ProviderOnly => update.with_provider(script.provider.clone()),
            HandshakeMode::Empty => update,
        })
    }

    async fn get_provider(&self) -> Result<Provider, ConnectorError> {
        self.query(|s| s.provider.clone()).await
    }

    async fn get_chain_id(&self) -> Result<RawChainId, ConnectorError> {
        self.query(|s| s.chain_id.clone()).await
    }

    async fn get_account(&self) -> Result<Option<String>, ConnectorError> {
        self.query(|s| s.account.clone()).await
    }

    fn supported_chain_ids(&self) -> Option<&[ChainId]> {
        self.supported.as_deref()
    }

    fn deactivate(&self) {
        let was_active = std::mem::replace(&mut self.script.lock().active, false);
        if was_active {
            self.deactivations.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(connector = %self.name, "in-memory connector deactivated");
            self.events.emit_deactivate();
        }
    }

    fn events(&self) -> &EventEmitter {
        &self.events
    }
}

impl std::fmt::Debug for InMemoryConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryConnector")
            .field("name", &self.name)
            .field("supported", &self.supported)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ConnectorEvent, ConnectorEventKind};

    #[tokio::test]
    async fn test_full_handshake_reports_every_field() {
        let connector = InMemoryConnector::new("injected")
            .with_chain_id("0x89")
            .with_account(Some("0xabc"));
        let update = connector.activate().await.unwrap();
        assert!(update.provider.is_some());
        assert_eq!(update.chain_id, Some(RawChainId::Text("0x89".into())));
        assert_eq!(update.account, Some(Some("0xabc".to_string())));
        assert!(connector.is_active());
        assert_eq!(connector.activation_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_handshake_stays_inactive() {
        let connector = InMemoryConnector::new("injected").rejecting(ConnectorError::user_rejected());
        let err = connector.activate().await.unwrap_err();
        assert!(err.is_user_rejected());
        assert!(!connector.is_active());
    }

    #[tokio::test]
    async fn test_deactivate_is_idempotent_and_emits_once() {
        let connector = InMemoryConnector::new("injected");
        let mut sub = connector.events().subscribe(&ConnectorEventKind::ALL);
        connector.activate().await.unwrap();

        connector.deactivate();
        connector.deactivate();

        assert_eq!(connector.deactivation_count(), 1);
        assert!(matches!(sub.events.try_recv(), Ok(ConnectorEvent::Deactivate)));
        assert!(sub.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_query_failure_is_reported() {
        let connector = InMemoryConnector::new("injected");
        connector.fail_queries(Some(ConnectorError::new("rpc down")));
        assert_eq!(connector.get_chain_id().await.unwrap_err().message, "rpc down");
        connector.fail_queries(None);
        assert!(connector.get_chain_id().await.is_ok());
    }

    #[test]
    fn test_switch_chain_emits_partial_update() {
        let connector = InMemoryConnector::new("injected");
        let mut sub = connector.events().subscribe(&[ConnectorEventKind::Update]);
        connector.switch_chain(137u64);
        match sub.events.try_recv() {
            Ok(ConnectorEvent::Update(update)) => {
                assert_eq!(update.chain_id, Some(RawChainId::Integer(137)));
                assert!(update.account.is_none());
                assert!(update.provider.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
