//! Session state machine.
//!
//! ```text
//! idle ──submit(valid)──▶ sending ──complete──▶ success
//!   │                       │ ──error/failure──▶ error
//!   └─submit(invalid)─▶ error  ──cancel────────▶ cancelled
//!
//! success | error | cancelled ──clear──▶ idle
//! ```
//!
//! Every attempt gets a new attempt number. Commands and failures carry the
//! attempt they belong to and are dropped unless that attempt is still
//! `sending`, so a late frame from a cancelled or finished request can never
//! touch the state of the current one. Each mutating method returns the events
//! describing what changed, in order.

use crate::error::{Error, Result, ValidationError};
use crate::interpreter::Command;
use crate::types::{
    LogLine, Phase, RecipientResult, SendCounts, SessionEvent, SessionSnapshot,
};
use chrono::{DateTime, Local};

/// First log line of every attempt
pub const START_LOG: &str = "Starting process...";

/// Log line appended when the user cancels
pub const CANCEL_LOG: &str = "--- Process cancelled by user. ---";

/// Single-owner state of one send session
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    attempt: u64,
    phase: Phase,
    logs: Vec<LogLine>,
    results: Vec<RecipientResult>,
    counts: SendCounts,
    last_error: Option<String>,
    completed_at: Option<DateTime<Local>>,
}

impl SessionState {
    /// Fresh idle session
    pub fn new() -> Self {
        Self::default()
    }

    /// Current attempt number (0 before the first submission)
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Running log
    pub fn logs(&self) -> &[LogLine] {
        &self.logs
    }

    /// Per-recipient results
    pub fn results(&self) -> &[RecipientResult] {
        &self.results
    }

    /// Final counts
    pub fn counts(&self) -> SendCounts {
        self.counts
    }

    /// Message for the last failure
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether `attempt` is the current attempt and still in flight
    pub fn is_live(&self, attempt: u64) -> bool {
        self.attempt == attempt && self.phase == Phase::Sending
    }

    /// Cloned view of the whole state
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            attempt: self.attempt,
            phase: self.phase,
            logs: self.logs.clone(),
            results: self.results.clone(),
            counts: self.counts,
            last_error: self.last_error.clone(),
            completed_at: self.completed_at,
        }
    }

    /// Start a new attempt: `idle → sending`
    ///
    /// Returns the new attempt number. Fails with [`Error::SessionBusy`] while
    /// another attempt is in flight.
    pub fn begin(&mut self) -> Result<(u64, Vec<SessionEvent>)> {
        if !self.phase.accepts_submit() {
            return Err(Error::SessionBusy);
        }

        self.reset_for_attempt();
        let attempt = self.attempt;
        let mut events = self.set_phase(Phase::Sending);
        events.push(self.push_log(START_LOG.into()));
        Ok((attempt, events))
    }

    /// Reject a submission before it starts: `idle → error`
    pub fn reject(&mut self, error: &ValidationError) -> Result<Vec<SessionEvent>> {
        if !self.phase.accepts_submit() {
            return Err(Error::SessionBusy);
        }

        self.reset_for_attempt();
        let message = error.to_string();
        self.last_error = Some(message.clone());
        let mut events = self.set_phase(Phase::Error);
        events.push(SessionEvent::Failed {
            attempt: self.attempt,
            message,
        });
        Ok(events)
    }

    /// Apply an interpreted frame to `attempt`
    ///
    /// Ignored unless `attempt` is live.
    pub fn apply(&mut self, attempt: u64, command: Command) -> Vec<SessionEvent> {
        if !self.is_live(attempt) {
            tracing::debug!(attempt, current = self.attempt, phase = %self.phase, "Dropping command for inactive attempt");
            return Vec::new();
        }

        match command {
            Command::AppendLog(line) => vec![self.push_log(line)],
            Command::RecordResult { result, log } => {
                self.results.push(result.clone());
                vec![
                    SessionEvent::Result { attempt, result },
                    self.push_log(log),
                ]
            }
            Command::Complete { counts, log } => {
                self.counts = counts;
                self.completed_at = Some(Local::now());
                let mut events = self.set_phase(Phase::Success);
                events.push(self.push_log(log));
                events.push(SessionEvent::Completed { attempt, counts });
                events
            }
            Command::Fail { message, log } => {
                self.last_error = Some(message.clone());
                let mut events = self.set_phase(Phase::Error);
                events.push(self.push_log(log));
                events.push(SessionEvent::Failed { attempt, message });
                events
            }
            Command::Ignore { kind } => {
                tracing::debug!(attempt, kind = %kind, "Ignoring unknown frame type");
                Vec::new()
            }
        }
    }

    /// Fail `attempt` because of a credential, transport or protocol error
    ///
    /// The user sees the generic message; the cause goes to the log. Ignored
    /// unless `attempt` is live, and for [`Error::Cancelled`].
    pub fn fail(&mut self, attempt: u64, error: &Error) -> Vec<SessionEvent> {
        if error.is_cancelled() || !self.is_live(attempt) {
            return Vec::new();
        }

        let message = error.user_message();
        self.last_error = Some(message.clone());
        let mut events = self.set_phase(Phase::Error);
        events.push(self.push_log(format!("--- CRITICAL ERROR: {error} ---").into()));
        events.push(SessionEvent::Failed { attempt, message });
        events
    }

    /// Append an informational line to a live attempt
    pub fn note(&mut self, attempt: u64, line: impl Into<LogLine>) -> Vec<SessionEvent> {
        if !self.is_live(attempt) {
            return Vec::new();
        }
        vec![self.push_log(line.into())]
    }

    /// Cancel the attempt in flight: `sending → cancelled`
    ///
    /// A no-op in any other phase, so calling it twice has the same effect as
    /// calling it once.
    pub fn cancel(&mut self) -> Vec<SessionEvent> {
        if self.phase != Phase::Sending {
            return Vec::new();
        }

        let attempt = self.attempt;
        let mut events = self.set_phase(Phase::Cancelled);
        events.push(self.push_log(CANCEL_LOG.into()));
        events.push(SessionEvent::Cancelled { attempt });
        events
    }

    /// Wipe all accumulated state: `success | error | cancelled → idle`
    ///
    /// The attempt counter is kept so attempt numbers never repeat.
    pub fn clear(&mut self) -> Result<Vec<SessionEvent>> {
        if self.phase == Phase::Sending {
            return Err(Error::SessionBusy);
        }

        let attempt = self.attempt;
        *self = Self {
            attempt,
            ..Self::default()
        };
        Ok(vec![SessionEvent::Cleared])
    }

    fn reset_for_attempt(&mut self) {
        let attempt = self.attempt + 1;
        *self = Self {
            attempt,
            ..Self::default()
        };
    }

    fn set_phase(&mut self, phase: Phase) -> Vec<SessionEvent> {
        self.phase = phase;
        vec![SessionEvent::PhaseChanged {
            attempt: self.attempt,
            phase,
        }]
    }

    fn push_log(&mut self, line: LogLine) -> SessionEvent {
        self.logs.push(line.clone());
        SessionEvent::Log {
            attempt: self.attempt,
            line,
        }
    }
}
