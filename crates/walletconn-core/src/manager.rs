//! Connection manager: `activate` / `deactivate`
//!
//! Activation protocol:
//!
//! 1. run the connector's handshake
//! 2. record the connector (this attaches the reconciler's subscription
//!    before any further await, so no connector event is missed)
//! 3. resolve the full update
//! 4. publish `getLibrary(provider)`, chain id and account, clear `error`
//!
//! `active` only becomes true in step 4. Any failure after a successful
//! handshake releases the connector before the error is reported.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use walletconn_connector::SharedConnector;
use walletconn_types::{Account, ChainId, Library, Provider, Result, SessionError};

use crate::config::ManagerConfig;
use crate::library::library_transform;
use crate::resolve::parse_update;
use crate::session::{Session, Ticket};
use crate::state::{ConnectionState, StatePatch};

pub type ErrorCallback = Box<dyn FnOnce(SessionError) + Send>;

/// Per-call error channel for [`ConnectionManager::activate_with`].
///
/// A callback wins over `throw_errors`; with neither, the manager's
/// configured default applies.
#[derive(Default)]
pub struct ActivateOptions {
    on_error: Option<ErrorCallback>,
    throw_errors: Option<bool>,
}

impl ActivateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_error(mut self, callback: impl FnOnce(SessionError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    pub fn throw_errors(mut self, throw_errors: bool) -> Self {
        self.throw_errors = Some(throw_errors);
        self
    }
}

impl std::fmt::Debug for ActivateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivateOptions")
            .field("on_error", &self.on_error.is_some())
            .field("throw_errors", &self.throw_errors)
            .finish()
    }
}

/// How an activation attempt ended without error.
enum Outcome {
    Published,
    Superseded,
}

/// Mediates between one application and whichever connector it activates.
///
/// Must be used from within a tokio runtime: attaching to a connector spawns
/// the task that drains its events. Dropping the manager tears the session
/// down and releases the recorded connector.
pub struct ConnectionManager {
    session: Arc<Session>,
    throw_errors: bool,
}

impl ConnectionManager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            session: Session::new(config.library),
            throw_errors: config.throw_errors,
        }
    }

    /// Register the `getLibrary` transform. Only the first registration
    /// (or the one given in [`ManagerConfig`]) takes effect; returns whether
    /// this one did.
    pub fn register_library<F>(&self, f: F) -> bool
    where
        F: Fn(&Provider) -> Library + Send + Sync + 'static,
    {
        self.session.library.register(library_transform(f))
    }

    /// Activate with the manager's default error channel.
    pub async fn activate(&self, connector: SharedConnector) -> Result<()> {
        self.activate_with(connector, ActivateOptions::default()).await
    }

    /// Activate `connector`, reporting failure through `options`.
    ///
    /// Returns `Err` only when the error channel is "throw". A newer
    /// activation or a `deactivate` that starts while this one is in flight
    /// wins; this call then returns `Ok` without publishing anything.
    pub async fn activate_with(&self, connector: SharedConnector, options: ActivateOptions) -> Result<()> {
        if !self.session.library.is_set() {
            warn!(connector = %connector.name(), "activation attempted before getLibrary was registered");
            return self.report(SessionError::LibraryTransformUnset, options, None);
        }

        let ticket = self.session.begin_activation(&connector);
        let mut handshake_done = false;

        match self.run_activation(&connector, ticket, &mut handshake_done).await {
            Ok(Outcome::Published) => {
                let state = self.session.store.snapshot();
                info!(
                    connector = %connector.name(),
                    chain_id = %state.chain_id,
                    active = state.active(),
                    "connector activated"
                );
                Ok(())
            }
            Ok(Outcome::Superseded) => {
                debug!(connector = %connector.name(), "activation superseded");
                if handshake_done {
                    self.session.release_stale(&connector);
                }
                Ok(())
            }
            Err(error) => {
                let current = self.session.is_latest(ticket);
                if handshake_done {
                    if current {
                        self.release_current(&connector);
                    } else {
                        self.session.release_stale(&connector);
                    }
                }
                warn!(connector = %connector.name(), %error, "activation failed");
                self.report(error, options, Some(current))
            }
        }
    }

    async fn run_activation(
        &self,
        connector: &SharedConnector,
        ticket: Ticket,
        handshake_done: &mut bool,
    ) -> Result<Outcome> {
        let update = connector.activate().await?;
        *handshake_done = true;

        // Record the connector now so its events are not missed. A different
        // connector replaces the whole previous session in the same write.
        let recorded = self.session.publish(ticket, |state| {
            (!state.is_current(connector)).then(|| StatePatch::reset().connector(connector.clone()))
        });
        if !recorded {
            return Ok(Outcome::Superseded);
        }

        let resolved = parse_update(connector.as_ref(), update).await?;
        let library = self.session.library.build(&resolved.provider)?;

        let published = self.session.publish(ticket, |_| {
            Some(StatePatch::new()
                .library(library)
                .chain_id(resolved.chain_id)
                .account(resolved.account.into())
                .clear_error()
                .established())
        });
        Ok(if published {
            Outcome::Published
        } else {
            Outcome::Superseded
        })
    }

    /// Release a connector whose activation failed while it was the newest.
    fn release_current(&self, connector: &SharedConnector) {
        if self.session.store.snapshot().is_current(connector) {
            // the attachment cleanup deactivates it
            self.session.reset();
        } else {
            connector.deactivate();
        }
    }

    /// Deliver an activation error: callback, else return it, else reset
    /// the record (only if this activation was still the newest) and log.
    fn report(&self, error: SessionError, options: ActivateOptions, current: Option<bool>) -> Result<()> {
        if let Some(on_error) = options.on_error {
            on_error(error);
            return Ok(());
        }
        if options.throw_errors.unwrap_or(self.throw_errors) {
            return Err(error);
        }
        match current {
            Some(true) => {
                self.session.reset();
                warn!(%error, "activation error, connection state reset");
            }
            Some(false) => warn!(%error, "stale activation error ignored"),
            None => warn!(%error, "activation error, connection state unchanged"),
        }
        Ok(())
    }

    /// Ask the recorded connector to deactivate. The state reset follows
    /// when the connector reports `Deactivate`. No-op without a connector.
    pub fn deactivate(&self) {
        let Some(connector) = self.session.store.current_connector() else {
            debug!("deactivate called with no connector recorded");
            return;
        };
        self.session.invalidate_activations();
        self.session.mark_released(&connector);
        info!(connector = %connector.name(), "deactivating connector");
        connector.deactivate();
    }

    /// Tear the session down: reset the record and release the connector.
    pub fn shutdown(&self) {
        self.session.invalidate_activations();
        self.session.reset();
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.session.store.snapshot()
    }

    /// Receiver that is notified on every state change.
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.session.store.watch()
    }

    pub fn connector(&self) -> Option<SharedConnector> {
        self.session.store.current_connector()
    }

    pub fn library(&self) -> Option<Library> {
        self.state().library
    }

    pub fn chain_id(&self) -> ChainId {
        self.state().chain_id
    }

    pub fn account(&self) -> Account {
        self.state().account
    }

    pub fn active(&self) -> bool {
        self.state().active()
    }

    pub fn error(&self) -> Option<SessionError> {
        self.state().error
    }

    /// Whether the reconciler currently holds an event subscription.
    pub fn is_subscribed(&self) -> bool {
        self.session.is_subscribed()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("throw_errors", &self.throw_errors)
            .finish()
    }
}
