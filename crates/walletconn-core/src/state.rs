//! Shared connection state
//!
//! One [`ConnectionState`] record per manager. Every write is a merge of a
//! [`StatePatch`]: fields the patch does not name are left alone.

use serde::Serialize;
use tokio::sync::watch;

use walletconn_connector::{same_connector, SharedConnector};
use walletconn_types::{Account, ChainId, Library, SessionError};

/// The connection record the application reads.
#[derive(Clone, Default)]
pub struct ConnectionState {
    /// Connector currently recorded as current
    pub connector: Option<SharedConnector>,
    /// `getLibrary(provider)` from the last successful resolution
    pub library: Option<Library>,
    /// Normalized chain id, `0` while disconnected
    pub chain_id: ChainId,
    pub account: Account,
    /// Set while the session is degraded and needs recovery
    pub error: Option<SessionError>,
    /// Set by a fully successful activation, cleared by reset
    established: bool,
}

impl ConnectionState {
    /// True only when an activation completed, a connector is recorded and
    /// an account address is known.
    pub fn active(&self) -> bool {
        self.established && self.connector.is_some() && self.account.is_address()
    }

    pub fn connector_name(&self) -> Option<&str> {
        self.connector.as_ref().map(|c| c.name())
    }

    /// Whether `connector` is the one recorded as current.
    pub fn is_current(&self, connector: &SharedConnector) -> bool {
        self.connector
            .as_ref()
            .map_or(false, |current| same_connector(current, connector))
    }

    /// Whether every field holds its disconnected default.
    pub fn is_disconnected(&self) -> bool {
        self.connector.is_none()
            && self.library.is_none()
            && self.chain_id.is_disconnected()
            && self.account == Account::Unknown
            && self.error.is_none()
            && !self.established
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            connector: self.connector_name().map(str::to_string),
            has_library: self.library.is_some(),
            chain_id: self.chain_id,
            account: self.account.clone(),
            active: self.active(),
            error: self.error.as_ref().map(ToString::to_string),
        }
    }
}

impl std::fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionState")
            .field("connector", &self.connector_name())
            .field("library", &self.library)
            .field("chain_id", &self.chain_id)
            .field("account", &self.account)
            .field("active", &self.active())
            .field("error", &self.error)
            .finish()
    }
}

/// Serializable view of [`ConnectionState`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub connector: Option<String>,
    pub has_library: bool,
    pub chain_id: ChainId,
    pub account: Account,
    pub active: bool,
    pub error: Option<String>,
}

/// A set of field writes. `None` means "leave the field alone".
#[derive(Default)]
pub(crate) struct StatePatch {
    connector: Option<Option<SharedConnector>>,
    library: Option<Option<Library>>,
    chain_id: Option<ChainId>,
    account: Option<Account>,
    error: Option<Option<SessionError>>,
    established: Option<bool>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every field back to its disconnected default.
    pub fn reset() -> Self {
        Self {
            connector: Some(None),
            library: Some(None),
            chain_id: Some(ChainId::DISCONNECTED),
            account: Some(Account::Unknown),
            error: Some(None),
            established: Some(false),
        }
    }

    pub fn connector(mut self, connector: SharedConnector) -> Self {
        self.connector = Some(Some(connector));
        self
    }

    pub fn library(mut self, library: Library) -> Self {
        self.library = Some(Some(library));
        self
    }

    pub fn chain_id(mut self, chain_id: ChainId) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn account(mut self, account: Account) -> Self {
        self.account = Some(account);
        self
    }

    pub fn error(mut self, error: SessionError) -> Self {
        self.error = Some(Some(error));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    pub fn established(mut self) -> Self {
        self.established = Some(true);
        self
    }

    fn apply(self, state: &mut ConnectionState) {
        if let Some(connector) = self.connector {
            state.connector = connector;
        }
        if let Some(library) = self.library {
            state.library = library;
        }
        if let Some(chain_id) = self.chain_id {
            state.chain_id = chain_id;
        }
        if let Some(account) = self.account {
            state.account = account;
        }
        if let Some(error) = self.error {
            state.error = error;
        }
        if let Some(established) = self.established {
            state.established = established;
        }
    }
}

/// Outcome of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Merged {
    pub connector_changed: bool,
}

/// The single shared record plus change notification.
pub(crate) struct StateStore {
    tx: watch::Sender<ConnectionState>,
}

impl StateStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionState::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> ConnectionState {
        self.tx.borrow().clone()
    }

    pub fn current_connector(&self) -> Option<SharedConnector> {
        self.tx.borrow().connector.clone()
    }

    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    pub fn merge(&self, patch: StatePatch) -> Merged {
        self.merge_with(|_| Some(patch))
            .unwrap_or(Merged { connector_changed: false })
    }

    /// Merge only if `guard` accepts the record as it is at write time.
    pub fn merge_if(
        &self,
        guard: impl FnOnce(&ConnectionState) -> bool,
        patch: StatePatch,
    ) -> Option<Merged> {
        self.merge_with(|state| guard(state).then_some(patch))
    }

    /// Build the patch from the record as it is at write time; `None` skips
    /// the write and leaves watchers un-notified.
    pub fn merge_with(
        &self,
        build: impl FnOnce(&ConnectionState) -> Option<StatePatch>,
    ) -> Option<Merged> {
        let mut merged = None;
        self.tx.send_if_modified(|state| {
            let Some(patch) = build(state) else {
                return false;
            };
            let before = state.connector.clone();
            patch.apply(state);
            let connector_changed = match (&before, &state.connector) {
                (Some(a), Some(b)) => !same_connector(a, b),
                (None, None) => false,
                _ => true,
            };
            merged = Some(Merged { connector_changed });
            true
        });
        merged
    }
}
