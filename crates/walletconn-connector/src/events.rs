//! Connector lifecycle events
//!
//! Listeners register for a set of event kinds and receive matching events
//! on their own unbounded channel, in emission order.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use walletconn_types::{ConnectorUpdate, SessionError};

#[derive(Debug, Clone)]
pub enum ConnectorEvent {
    /// Some of provider / chain id / account changed
    Update(ConnectorUpdate),
    /// The connector hit an error it cannot recover from on its own
    Error(SessionError),
    /// The wallet session ended
    Deactivate,
}

impl ConnectorEvent {
    pub fn kind(&self) -> ConnectorEventKind {
        match self {
            Self::Update(_) => ConnectorEventKind::Update,
            Self::Error(_) => ConnectorEventKind::Error,
            Self::Deactivate => ConnectorEventKind::Deactivate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorEventKind {
    Update,
    Error,
    Deactivate,
}

impl ConnectorEventKind {
    pub const ALL: [ConnectorEventKind; 3] = [Self::Update, Self::Error, Self::Deactivate];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A registered listener's receiving end.
#[derive(Debug)]
pub struct Subscription {
    pub id: ListenerId,
    pub events: mpsc::UnboundedReceiver<ConnectorEvent>,
}

struct Listener {
    id: ListenerId,
    kinds: Vec<ConnectorEventKind>,
    sender: mpsc::UnboundedSender<ConnectorEvent>,
}

/// Listener registry embedded in every connector.
pub struct EventEmitter {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Register a listener for the given event kinds.
    pub fn subscribe(&self, kinds: &[ConnectorEventKind]) -> Subscription {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, events) = mpsc::unbounded_channel();
        self.listeners.lock().push(Listener {
            id,
            kinds: kinds.to_vec(),
            sender,
        });
        tracing::trace!(listener = id.0, ?kinds, "connector listener registered");
        Subscription { id, events }
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Deliver an event to every listener registered for its kind.
    /// Returns how many listeners received it.
    pub fn emit(&self, event: ConnectorEvent) -> usize {
        let kind = event.kind();
        let mut delivered = 0;
        self.listeners.lock().retain(|listener| {
            if !listener.kinds.contains(&kind) {
                return true;
            }
            match listener.sender.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                // receiver dropped without unsubscribing
                Err(_) => false,
            }
        });
        delivered
    }

    pub fn emit_update(&self, update: ConnectorUpdate) -> usize {
        self.emit(ConnectorEvent::Update(update))
    }

    pub fn emit_error(&self, error: impl Into<SessionError>) -> usize {
        self.emit(ConnectorEvent::Error(error.into()))
    }

    pub fn emit_deactivate(&self) -> usize {
        self.emit(ConnectorEvent::Deactivate)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use walletconn_types::ConnectorError;

    #[test]
    fn test_events_delivered_in_order_to_matching_kinds() {
        let emitter = EventEmitter::new();
        let mut all = emitter.subscribe(&ConnectorEventKind::ALL);
        let mut errors_only = emitter.subscribe(&[ConnectorEventKind::Error]);

        emitter.emit_update(ConnectorUpdate::new().with_chain_id("0x1"));
        emitter.emit_error(ConnectorError::new("boom"));
        emitter.emit_deactivate();

        let kinds: Vec<_> = std::iter::from_fn(|| all.events.try_recv().ok())
            .map(|e| e.kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                ConnectorEventKind::Update,
                ConnectorEventKind::Error,
                ConnectorEventKind::Deactivate
            ]
        );

        assert!(matches!(errors_only.events.try_recv(), Ok(ConnectorEvent::Error(_))));
        assert!(errors_only.events.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let emitter = EventEmitter::new();
        let sub = emitter.subscribe(&ConnectorEventKind::ALL);
        assert_eq!(emitter.listener_count(), 1);
        assert!(emitter.unsubscribe(sub.id));
        assert!(!emitter.unsubscribe(sub.id));
        assert_eq!(emitter.emit_deactivate(), 0);
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let emitter = EventEmitter::new();
        drop(emitter.subscribe(&ConnectorEventKind::ALL));
        assert_eq!(emitter.emit_deactivate(), 0);
        assert_eq!(emitter.listener_count(), 0);
    }
}
