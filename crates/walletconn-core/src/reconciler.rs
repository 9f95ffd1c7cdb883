//! Update reconciler
//!
//! Keeps exactly one event subscription on whichever connector the state
//! record holds, and folds that connector's `Update` / `Error` /
//! `Deactivate` events into the record.
//!
//! ```text
//! Unattached ──connector recorded──→ Subscribed
//! Subscribed ──connector cleared / replaced / Deactivate event──→ Unattached
//! ```
//!
//! Updates are handled in one of two modes, picked from the record's
//! `error` field when the event arrives:
//!
//! - **steady**: refresh `chain_id` / `account`; the library is untouched
//! - **recovering**: fully re-resolve, rebuild the library, clear `error`
//!
//! Reconciliation never returns errors. Failures land in the record's
//! `error` field for the application to render.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::task::JoinHandle;

use walletconn_connector::{same_connector, ConnectorEvent, ConnectorEventKind, ListenerId, SharedConnector};
use walletconn_types::{normalize_chain_id, Account, ConnectorUpdate, SessionError};

use crate::resolve::{ensure_supported, parse_update};
use crate::session::Session;
use crate::state::StatePatch;

/// A live subscription on one connector.
pub(crate) struct Attachment {
    connector: SharedConnector,
    listener: ListenerId,
    pump: JoinHandle<()>,
    /// Set once the connector's own deactivation has been triggered or observed
    released: Arc<AtomicBool>,
}

impl Attachment {
    fn attach(session: &Arc<Session>, connector: SharedConnector) -> Self {
        let mut subscription = connector.events().subscribe(&ConnectorEventKind::ALL);
        let listener = subscription.id;
        let released = Arc::new(AtomicBool::new(false));

        let weak: Weak<Session> = Arc::downgrade(session);
        let pump_connector = connector.clone();
        let pump_released = released.clone();
        let pump = tokio::spawn(async move {
            // One event at a time, in emission order.
            while let Some(event) = subscription.events.recv().await {
                let Some(session) = weak.upgrade() else {
                    break;
                };
                let last = matches!(event, ConnectorEvent::Deactivate);
                session.reconcile(&pump_connector, &pump_released, event).await;
                if last {
                    break;
                }
            }
        });

        tracing::debug!(connector = %connector.name(), "subscribed to connector events");
        Self {
            connector,
            listener,
            pump,
            released,
        }
    }

    /// Unsubscribe, then release the connector unless that already happened.
    fn teardown(self) {
        self.connector.events().unsubscribe(self.listener);
        self.pump.abort();
        tracing::debug!(connector = %self.connector.name(), "unsubscribed from connector events");
        if !self.released.swap(true, Ordering::SeqCst) {
            self.connector.deactivate();
        }
    }

    fn is_for(&self, connector: &SharedConnector) -> bool {
        same_connector(&self.connector, connector)
    }
}

impl Session {
    /// Bring the subscription in line with the recorded connector.
    pub(crate) fn sync_attachment(self: &Arc<Self>) {
        let detached = {
            let mut slot = self.attachment.lock();
            let current = self.store.current_connector();
            let unchanged = match (slot.as_ref(), current.as_ref()) {
                (Some(attached), Some(current)) => attached.is_for(current),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return;
            }
            let detached = slot.take();
            *slot = current.map(|connector| Attachment::attach(self, connector));
            detached
        };

        if let Some(attachment) = detached {
            attachment.teardown();
        }
    }

    /// Note that `connector` is being deactivated by the caller, so the
    /// attachment cleanup does not deactivate it a second time.
    pub(crate) fn mark_released(&self, connector: &SharedConnector) {
        if let Some(attachment) = self.attachment.lock().as_ref() {
            if attachment.is_for(connector) {
                attachment.released.store(true, Ordering::SeqCst);
            }
        }
    }

    pub(crate) fn is_subscribed(&self) -> bool {
        self.attachment.lock().is_some()
    }

    async fn reconcile(self: &Arc<Self>, connector: &SharedConnector, released: &AtomicBool, event: ConnectorEvent) {
        match event {
            ConnectorEvent::Update(update) => self.handle_update(connector, update).await,
            ConnectorEvent::Error(error) => self.record_error(connector, error),
            ConnectorEvent::Deactivate => {
                released.store(true, Ordering::SeqCst);
                self.handle_deactivate(connector);
            }
        }
    }

    async fn handle_update(self: &Arc<Self>, connector: &SharedConnector, update: ConnectorUpdate) {
        let recovering = {
            let state = self.store.snapshot();
            if !state.is_current(connector) {
                return;
            }
            state.error.is_some()
        };

        if recovering {
            self.recover(connector, update).await;
        } else {
            self.refresh(connector, update).await;
        }
    }

    /// Steady state: keep chain id and account current.
    async fn refresh(self: &Arc<Self>, connector: &SharedConnector, update: ConnectorUpdate) {
        if let Some(raw) = &update.chain_id {
            let chain_id = match normalize_chain_id(raw) {
                Ok(chain_id) => chain_id,
                Err(error) => return self.record_error(connector, error),
            };
            if let Err(error) = ensure_supported(connector.as_ref(), chain_id) {
                tracing::warn!(connector = %connector.name(), %chain_id, "connector switched to an unsupported chain");
                self.merge_for(connector, StatePatch::new().error(error).account(Account::None));
                return;
            }
        }

        match parse_update(connector.as_ref(), update).await {
            Ok(resolved) => {
                self.merge_for(
                    connector,
                    StatePatch::new()
                        .chain_id(resolved.chain_id)
                        .account(resolved.account.into()),
                );
            }
            Err(error) => self.record_error(connector, error),
        }
    }

    /// Error state: a fully resolved update clears the error.
    async fn recover(self: &Arc<Self>, connector: &SharedConnector, update: ConnectorUpdate) {
        let resolved = match parse_update(connector.as_ref(), update).await {
            Ok(resolved) => resolved,
            Err(error) => return self.record_error(connector, error),
        };
        let library = match self.library.build(&resolved.provider) {
            Ok(library) => library,
            Err(error) => return self.record_error(connector, error),
        };

        let recovered = self.merge_for(
            connector,
            StatePatch::new()
                .library(library)
                .chain_id(resolved.chain_id)
                .account(resolved.account.into())
                .clear_error(),
        );
        if recovered {
            tracing::info!(connector = %connector.name(), chain_id = %resolved.chain_id, "connection recovered");
        }
    }

    fn record_error(self: &Arc<Self>, connector: &SharedConnector, error: SessionError) {
        tracing::warn!(connector = %connector.name(), %error, "connector error recorded");
        self.merge_for(connector, StatePatch::new().error(error));
    }

    fn handle_deactivate(self: &Arc<Self>, connector: &SharedConnector) {
        self.invalidate_activations_of(connector);
        if self.merge_for(connector, StatePatch::reset()) {
            tracing::info!(connector = %connector.name(), "connector deactivated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use walletconn_connector::{Connector, InMemoryConnector};

    #[tokio::test]
    async fn test_attach_and_detach_follow_recorded_connector() {
        let session = Session::new(None);
        let wallet = Arc::new(InMemoryConnector::new("injected"));
        let connector: SharedConnector = wallet.clone();

        session.merge(StatePatch::new().connector(connector.clone()));
        assert!(session.is_subscribed());
        assert_eq!(wallet.events().listener_count(), 1);

        // same connector again: no second subscription
        session.merge(StatePatch::new().connector(connector.clone()));
        assert_eq!(wallet.events().listener_count(), 1);

        session.reset();
        assert!(!session.is_subscribed());
        assert_eq!(wallet.events().listener_count(), 0);
    }

    #[tokio::test]
    async fn test_detach_releases_connector_once() {
        let session = Session::new(None);
        let wallet = Arc::new(InMemoryConnector::new("injected"));
        wallet.activate().await.unwrap();
        let connector: SharedConnector = wallet.clone();

        session.merge(StatePatch::new().connector(connector.clone()));
        session.mark_released(&connector);
        connector.deactivate();
        session.reset();

        assert_eq!(wallet.deactivation_count(), 1);
        assert!(!wallet.is_active());
    }
}
