//! Session watcher: the process-wide read side of the current session.
//!
//! Owns exactly one subscription to the gateway's auth-change stream and
//! republishes it as a [`tokio::sync::watch`] snapshot for screens to
//! observe. The snapshot's `restoring` flag is `true` only until the
//! first notification arrives after process start.

use crate::error::Result;
use crate::providers::AuthGateway;
use crate::state::Session;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// What the UI sees of the session at any moment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// The live session, if any.
    pub session: Option<Session>,

    /// True until the first auth-change notification after start.
    pub restoring: bool,
}

impl SessionSnapshot {
    /// Returns `true` once a session is held.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

/// Watches the gateway's auth-change stream.
///
/// Single-writer: only the pump task ever publishes snapshots. Teardown
/// is explicit via [`SessionWatcher::shutdown`]; dropping the watcher
/// aborts the pump as well.
#[derive(Debug)]
pub struct SessionWatcher {
    rx: watch::Receiver<SessionSnapshot>,
    pump: JoinHandle<()>,
}

impl SessionWatcher {
    /// Register the auth-change subscription and start the pump.
    ///
    /// The subscription is registered before this returns; a registration
    /// failure is fatal and surfaced to the caller rather than swallowed.
    ///
    /// # Errors
    ///
    /// Propagates the gateway's subscription error.
    pub fn spawn<G>(gateway: &G) -> Result<Self>
    where
        G: AuthGateway,
    {
        let mut changes = gateway.subscribe_changes()?;

        let (tx, rx) = watch::channel(SessionSnapshot {
            session: None,
            restoring: true,
        });

        let pump = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(session) => {
                        let _ = tx.send(SessionSnapshot {
                            session,
                            restoring: false,
                        });
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Only the latest session matters; skip ahead.
                        tracing::warn!(skipped, "Session watcher lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Self { rx, pump })
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.rx.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.rx.clone()
    }

    /// Wait until the restoration handshake has completed and return the
    /// resulting snapshot.
    pub async fn restored(&self) -> SessionSnapshot {
        let mut rx = self.rx.clone();
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if !snapshot.restoring {
                    return snapshot.clone();
                }
            }
            if rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }

    /// Stop the pump and unsubscribe.
    pub fn shutdown(&self) {
        self.pump.abort();
    }
}

impl Drop for SessionWatcher {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
