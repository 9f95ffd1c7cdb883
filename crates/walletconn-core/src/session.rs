//! Shared session internals
//!
//! [`Session`] owns the state record, the library slot, the activation
//! ordering and the reconciler attachment. The manager and the reconciler
//! both write through it, and every write that changes the recorded
//! connector re-syncs the event subscription.

use std::sync::Arc;

use parking_lot::Mutex;

use walletconn_connector::{same_connector, SharedConnector};

use crate::library::{LibrarySlot, LibraryTransform};
use crate::reconciler::Attachment;
use crate::state::{ConnectionState, Merged, StatePatch, StateStore};

/// Orders activations: only the newest one may publish.
#[derive(Default)]
struct ActivationTracker {
    epoch: u64,
    latest: Option<SharedConnector>,
}

/// Proof that an activation began, checked before each publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket(u64);

pub(crate) struct Session {
    pub store: StateStore,
    pub library: LibrarySlot,
    activations: Mutex<ActivationTracker>,
    pub(crate) attachment: Mutex<Option<Attachment>>,
}

impl Session {
    pub fn new(library: Option<LibraryTransform>) -> Arc<Self> {
        Arc::new(Self {
            store: StateStore::new(),
            library: LibrarySlot::new(library),
            activations: Mutex::new(ActivationTracker::default()),
            attachment: Mutex::new(None),
        })
    }

    // ── Activation ordering ──────────────────────────────────────────────────

    /// Start an activation; every earlier one becomes stale.
    pub fn begin_activation(&self, connector: &SharedConnector) -> Ticket {
        let mut tracker = self.activations.lock();
        tracker.epoch += 1;
        tracker.latest = Some(connector.clone());
        Ticket(tracker.epoch)
    }

    pub fn is_latest(&self, ticket: Ticket) -> bool {
        self.activations.lock().epoch == ticket.0
    }

    /// Whether the newest activation is working on `connector`.
    pub fn is_pending(&self, connector: &SharedConnector) -> bool {
        self.activations
            .lock()
            .latest
            .as_ref()
            .map_or(false, |latest| same_connector(latest, connector))
    }

    /// Make every in-flight activation stale.
    pub fn invalidate_activations(&self) {
        let mut tracker = self.activations.lock();
        tracker.epoch += 1;
        tracker.latest = None;
    }

    /// Make in-flight activations stale if the newest one targets `connector`.
    pub fn invalidate_activations_of(&self, connector: &SharedConnector) {
        let mut tracker = self.activations.lock();
        let targets = tracker
            .latest
            .as_ref()
            .map_or(false, |latest| same_connector(latest, connector));
        if targets {
            tracker.epoch += 1;
            tracker.latest = None;
        }
    }

    // ── Writes ───────────────────────────────────────────────────────────────

    /// Activation write: applied only while `ticket` is still the newest.
    /// `build` returning `None` writes nothing but still confirms the ticket.
    pub fn publish(
        self: &Arc<Self>,
        ticket: Ticket,
        build: impl FnOnce(&ConnectionState) -> Option<StatePatch>,
    ) -> bool {
        let merged = {
            let tracker = self.activations.lock();
            if tracker.epoch != ticket.0 {
                return false;
            }
            self.store.merge_with(build)
        };
        self.after_merge(merged);
        true
    }

    pub fn merge(self: &Arc<Self>, patch: StatePatch) {
        let merged = self.store.merge(patch);
        self.after_merge(Some(merged));
    }

    /// Reconciler write: applied only while `connector` is still recorded.
    pub fn merge_for(self: &Arc<Self>, connector: &SharedConnector, patch: StatePatch) -> bool {
        let merged = self.store.merge_if(|state| state.is_current(connector), patch);
        let applied = merged.is_some();
        self.after_merge(merged);
        applied
    }

    /// Back to disconnected defaults. The attachment cleanup releases the
    /// connector that was recorded, if any.
    pub fn reset(self: &Arc<Self>) {
        self.merge(StatePatch::reset());
    }

    fn after_merge(self: &Arc<Self>, merged: Option<Merged>) {
        if merged.map_or(false, |m| m.connector_changed) {
            self.sync_attachment();
        }
    }

    /// Release a connector that lost its activation race, unless it is the
    /// one recorded or the one the newest activation is using.
    pub fn release_stale(&self, connector: &SharedConnector) {
        if self.is_pending(connector) || self.store.snapshot().is_current(connector) {
            return;
        }
        tracing::debug!(connector = %connector.name(), "releasing superseded connector");
        connector.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use walletconn_connector::InMemoryConnector;
    use walletconn_types::ChainId;

    fn connector() -> SharedConnector {
        Arc::new(InMemoryConnector::new("injected"))
    }

    #[test]
    fn test_newer_activation_makes_older_stale() {
        let session = Session::new(None);
        let a = connector();
        let b = connector();

        let first = session.begin_activation(&a);
        let second = session.begin_activation(&b);

        assert!(!session.is_latest(first));
        assert!(session.is_latest(second));
        assert!(!session.publish(first, |_| Some(StatePatch::new().chain_id(ChainId(1)))));
        assert!(session.publish(second, |_| Some(StatePatch::new().chain_id(ChainId(2)))));
        assert_eq!(session.store.snapshot().chain_id, ChainId(2));
    }

    #[test]
    fn test_empty_publish_leaves_watchers_unnotified() {
        let session = Session::new(None);
        let a = connector();
        let mut rx = session.store.watch();
        rx.borrow_and_update();

        let ticket = session.begin_activation(&a);
        assert!(session.publish(ticket, |_| None));
        assert!(!rx.has_changed().unwrap());

        assert!(session.publish(ticket, |_| Some(StatePatch::new().chain_id(ChainId(5)))));
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_invalidate_only_matching_connector() {
        let session = Session::new(None);
        let a = connector();
        let b = connector();

        let ticket = session.begin_activation(&b);
        session.invalidate_activations_of(&a);
        assert!(session.is_latest(ticket));

        session.invalidate_activations_of(&b);
        assert!(!session.is_latest(ticket));
        assert!(!session.is_pending(&b));
    }
}
