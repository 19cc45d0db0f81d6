//! Submission: one attempt from validation to terminal phase.

use super::{ActiveJob, BulkSender};
use crate::decoder::FrameDecoder;
use crate::error::{Error, Result};
use crate::interpreter::{Command, interpret};
use crate::request::SendJobRequest;
use crate::types::SessionSnapshot;
use tokio_util::sync::CancellationToken;

impl BulkSender {
    /// Submit a send job and drive it to completion
    ///
    /// Resolves when the attempt reaches a terminal phase. Cancellation via
    /// [`BulkSender::cancel`] is not an error: the returned snapshot is in the
    /// `cancelled` phase.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the request fails pre-flight checks (nothing is sent)
    /// - [`Error::SessionBusy`] if another attempt is in flight
    /// - [`Error::Credential`] if no access token could be acquired
    /// - [`Error::Server`] if the server reported a fatal error frame
    /// - transport, protocol or [`Error::StreamEnded`] failures otherwise
    ///
    /// In every error case except `SessionBusy` the session is left in the
    /// `error` phase.
    pub async fn submit(&self, request: &SendJobRequest) -> Result<SessionSnapshot> {
        if let Err(e) = request.validate(&self.config) {
            let mut session = self.lock();
            let events = session.state.reject(&e)?;
            self.publish(events);
            tracing::warn!(error = %e, "Send request rejected");
            return Err(Error::Validation(e));
        }

        let (attempt, cancel_token) = {
            let mut session = self.lock();
            let (attempt, events) = session.state.begin()?;
            let cancel_token = CancellationToken::new();
            session.active = Some(ActiveJob {
                attempt,
                cancel_token: cancel_token.clone(),
            });
            self.publish(events);
            (attempt, cancel_token)
        };

        tracing::info!(
            attempt,
            transport = self.transport.name(),
            credentials = self.tokens.name(),
            delay_secs = request.delay_secs,
            "Starting bulk send"
        );

        let mut guard = AttemptGuard {
            sender: self,
            attempt,
            armed: true,
        };
        let outcome = self.run_attempt(attempt, request, &cancel_token).await;
        guard.armed = false;

        self.finish_attempt(attempt, outcome)
    }

    async fn run_attempt(
        &self,
        attempt: u64,
        request: &SendJobRequest,
        cancel_token: &CancellationToken,
    ) -> Result<()> {
        let access_token = tokio::select! {
            _ = cancel_token.cancelled() => return Err(Error::Cancelled),
            token = self.tokens.access_token() => token?,
        };

        let mut source = tokio::select! {
            _ = cancel_token.cancelled() => return Err(Error::Cancelled),
            source = self.transport.open(&access_token, request) => source?,
        };

        let mut decoder = FrameDecoder::new();
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel_token.cancelled() => return Err(Error::Cancelled),
                chunk = source.next_chunk() => chunk?,
            };
            let Some(chunk) = chunk else {
                break;
            };

            decoder.push(&chunk);
            while let Some(frame) = decoder.next_frame() {
                let command = interpret(frame?);
                let terminal = command.is_terminal();
                let server_error = match &command {
                    Command::Fail { message, .. } => Some(message.clone()),
                    _ => None,
                };

                {
                    let mut session = self.lock();
                    if cancel_token.is_cancelled() || !session.state.is_live(attempt) {
                        return Err(Error::Cancelled);
                    }
                    let events = session.state.apply(attempt, command);
                    self.publish(events);
                }

                // Nothing after a terminal frame is read
                if terminal {
                    return match server_error {
                        Some(message) => Err(Error::Server(message)),
                        None => Ok(()),
                    };
                }
            }
        }

        if let Some(leftover) = decoder.finish() {
            tracing::warn!(
                attempt,
                bytes = leftover.len(),
                "Progress stream ended with an incomplete record"
            );
            let mut session = self.lock();
            let events = session.state.note(
                attempt,
                format!(
                    "WARNING: stream ended with an incomplete record ({} bytes dropped)",
                    leftover.len()
                ),
            );
            self.publish(events);
        }

        Err(Error::StreamEnded)
    }

    fn finish_attempt(&self, attempt: u64, outcome: Result<()>) -> Result<SessionSnapshot> {
        let mut session = self.lock();
        if session
            .active
            .as_ref()
            .is_some_and(|job| job.attempt == attempt)
        {
            session.active = None;
        }

        match outcome {
            Ok(()) => {
                let counts = session.state.counts();
                tracing::info!(
                    attempt,
                    sent = counts.sent,
                    failed = counts.failed,
                    "Bulk send completed"
                );
                Ok(session.state.snapshot())
            }
            Err(Error::Cancelled) => {
                tracing::debug!(attempt, "Attempt stopped after cancellation");
                Ok(session.state.snapshot())
            }
            Err(e) => {
                tracing::error!(attempt, error = %e, code = e.error_code(), "Bulk send failed");
                let events = session.state.fail(attempt, &e);
                self.publish(events);
                Err(e)
            }
        }
    }

    /// Treat an abandoned attempt as cancelled
    fn abandon(&self, attempt: u64) {
        let mut session = self.lock();
        if !session
            .active
            .as_ref()
            .is_some_and(|job| job.attempt == attempt)
        {
            return;
        }

        if let Some(job) = session.active.take() {
            job.cancel_token.cancel();
        }
        let events = session.state.cancel();
        self.publish(events);
        tracing::warn!(attempt, "Submission dropped before finishing; attempt cancelled");
    }
}

/// Cancels the attempt if the `submit` future is dropped mid-flight
struct AttemptGuard<'a> {
    sender: &'a BulkSender,
    attempt: u64,
    armed: bool,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.sender.abandon(self.attempt);
        }
    }
}
