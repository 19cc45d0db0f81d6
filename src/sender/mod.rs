//! Send session orchestrator.
//!
//! [`BulkSender`] owns one [`SessionState`] and drives it from a single
//! submission at a time: validation, credential acquisition, the streaming
//! request, and frame application. Every state change is broadcast as a
//! [`SessionEvent`] while the session lock is held, so subscribers observe the
//! same order the state went through.

mod submit;

use crate::auth::TokenProvider;
use crate::config::Config;
use crate::error::Result;
use crate::report;
use crate::state::SessionState;
use crate::transport::{HttpTransport, Transport};
use crate::types::{Phase, SessionEvent, SessionSnapshot};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// The attempt currently in flight and the token that stops it
#[derive(Debug)]
struct ActiveJob {
    attempt: u64,
    cancel_token: CancellationToken,
}

#[derive(Debug, Default)]
struct Session {
    state: SessionState,
    active: Option<ActiveJob>,
}

/// Bulk mail send controller
///
/// Cheap to clone; clones share the same session. Typical use is to run
/// [`BulkSender::submit`] on one task and call [`BulkSender::cancel`] from
/// another.
#[derive(Clone)]
pub struct BulkSender {
    config: Arc<Config>,
    tokens: Arc<dyn TokenProvider>,
    transport: Arc<dyn Transport>,
    session: Arc<Mutex<Session>>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl BulkSender {
    /// Create a sender with explicit credential and transport implementations
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn new(
        config: Config,
        tokens: Arc<dyn TokenProvider>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(config.event_channel_capacity);

        Ok(Self {
            config: Arc::new(config),
            tokens,
            transport,
            session: Arc::new(Mutex::new(Session::default())),
            event_tx,
        })
    }

    /// Create a sender talking to the configured HTTP endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the HTTP client cannot be built
    pub fn with_http(config: Config, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Self::new(config, tokens, Arc::new(transport))
    }

    /// Subscribe to session events
    ///
    /// Each subscriber receives every event published after it subscribed. A
    /// subscriber that falls more than `event_channel_capacity` events behind
    /// gets `RecvError::Lagged` and should resynchronize from
    /// [`BulkSender::snapshot`].
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Copy of the current session state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().state.snapshot()
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.lock().state.phase()
    }

    /// Cancel the attempt in flight
    ///
    /// The request is aborted, the session moves to `cancelled`, and results
    /// received so far are kept. Returns `false` when nothing was in flight,
    /// including an attempt that already applied its terminal frame; calling it
    /// again after a successful cancel is a no-op.
    pub fn cancel(&self) -> bool {
        let mut session = self.lock();
        if session.state.phase() != Phase::Sending {
            return false;
        }
        let Some(job) = session.active.take() else {
            return false;
        };

        job.cancel_token.cancel();
        let events = session.state.cancel();
        self.publish(events);

        tracing::info!(attempt = job.attempt, "Bulk send cancelled by user");
        true
    }

    /// Wipe logs, results and errors, returning to `idle`
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionBusy`](crate::Error::SessionBusy) while an
    /// attempt is in flight.
    pub fn clear(&self) -> Result<()> {
        let mut session = self.lock();
        let events = session.state.clear()?;
        self.publish(events);
        Ok(())
    }

    /// Current results rendered as a CSV report
    pub fn report_csv(&self) -> String {
        report::to_csv(self.lock().state.results())
    }

    /// Write the current results as a CSV report into `dir`
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyReport`](crate::Error::EmptyReport) when there are
    /// no results yet, or an I/O error if the file cannot be written.
    pub async fn export_report(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let results = self.lock().state.results().to_vec();
        report::write_report(dir, &results).await
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Broadcast events; callers hold the session lock
    fn publish(&self, events: Vec<SessionEvent>) {
        for event in events {
            // No subscribers is fine
            self.event_tx.send(event).ok();
        }
    }
}

impl std::fmt::Debug for BulkSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkSender")
            .field("tokens", &self.tokens.name())
            .field("transport", &self.transport.name())
            .field("phase", &self.phase())
            .finish()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
