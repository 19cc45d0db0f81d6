//! Event-driven waits for integration tests

use bulk_mailer::{BulkSender, SessionEvent};
use std::time::Duration;

/// Outcome of waiting on the event channel
#[derive(Debug)]
pub enum WaitResult {
    /// A matching event arrived
    Matched(SessionEvent),
    /// Timeout waiting for the event
    Timeout,
    /// Channel closed unexpectedly
    ChannelClosed,
}

/// Wait for the first event matching `pred`
///
/// Subscribe before triggering the work, otherwise early events are missed.
pub async fn wait_for_event(
    events: &mut tokio::sync::broadcast::Receiver<SessionEvent>,
    timeout: Duration,
    pred: impl Fn(&SessionEvent) -> bool,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return WaitResult::Matched(event),
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Collect every event currently buffered for `events`
pub fn drain_events(
    events: &mut tokio::sync::broadcast::Receiver<SessionEvent>,
) -> Vec<SessionEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

/// Assert the session log ends with `line`
pub fn assert_last_log(sender: &BulkSender, line: &str) {
    let snapshot = sender.snapshot();
    let last = snapshot.logs.last().map(|l| l.as_str());
    assert_eq!(last, Some(line), "unexpected log tail: {:?}", snapshot.logs);
}
