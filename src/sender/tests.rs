//! Tests for the send orchestrator

use super::*;
use crate::auth::{SignedOutProvider, StaticTokenProvider};
use crate::error::{Error, GENERIC_FAILURE_MESSAGE};
use crate::request::{FileBlob, SendJobRequest};
use crate::state::{CANCEL_LOG, START_LOG};
use crate::transport::{ScriptStep, ScriptedTransport};
use crate::types::{DeliveryStatus, SendCounts};
use std::time::Duration;

const LOADED: &str = "data: {\"type\":\"log\",\"data\":\"Loaded 2 recipients.\"}\n\n";
const SENT_A: &str =
    "data: {\"type\":\"progress\",\"data\":{\"email\":\"a@x.com\",\"status\":\"sent\"}}\n\n";
const SENT_B: &str =
    "data: {\"type\":\"progress\",\"data\":{\"email\":\"b@x.com\",\"status\":\"sent\"}}\n\n";
const SENT_C: &str =
    "data: {\"type\":\"progress\",\"data\":{\"email\":\"c@x.com\",\"status\":\"sent\"}}\n\n";
const COMPLETE: &str = "data: {\"type\":\"complete\",\"data\":{\"sent\":2,\"failed\":0,\"message\":\"Finished.\"}}\n\n";

fn valid_request() -> SendJobRequest {
    SendJobRequest::builder()
        .recipients(FileBlob::new("people.xlsx", b"PK\x03\x04".to_vec()))
        .subject("Important Company Update")
        .body_text("Hello")
        .delay_secs(5)
        .build()
}

fn sender_with(transport: ScriptedTransport) -> BulkSender {
    BulkSender::new(
        Config::default(),
        Arc::new(StaticTokenProvider::new("tok-1")),
        Arc::new(transport),
    )
    .unwrap()
}

/// Wait for the first event matching `pred`
async fn wait_for(
    rx: &mut broadcast::Receiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.unwrap();
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for session event")
}

#[tokio::test]
async fn successful_job_reaches_success_byte_by_byte() {
    let body = [LOADED, SENT_A, SENT_B, COMPLETE].concat();
    let transport = ScriptedTransport::chunked(body.as_bytes(), 1);
    let sender = sender_with(transport.clone());

    let snapshot = sender.submit(&valid_request()).await.unwrap();

    assert_eq!(snapshot.phase, Phase::Success);
    assert_eq!(snapshot.counts, SendCounts { sent: 2, failed: 0 });
    let emails: Vec<_> = snapshot.results.iter().map(|r| r.email.as_str()).collect();
    assert_eq!(emails, ["a@x.com", "b@x.com"]);
    assert_eq!(snapshot.logs[0].as_str(), START_LOG);
    assert_eq!(snapshot.logs[1].as_str(), "STATUS: Loaded 2 recipients.");
    assert_eq!(transport.last_token().as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn events_follow_state_order() {
    let body = [SENT_A, COMPLETE].concat();
    let sender = sender_with(ScriptedTransport::chunked(body.as_bytes(), 7));
    let mut rx = sender.subscribe();

    sender.submit(&valid_request()).await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(
        events[0],
        SessionEvent::PhaseChanged {
            attempt: 1,
            phase: Phase::Sending
        }
    );
    let result_pos = events
        .iter()
        .position(|e| matches!(e, SessionEvent::Result { .. }))
        .unwrap();
    let completed_pos = events
        .iter()
        .position(|e| matches!(e, SessionEvent::Completed { .. }))
        .unwrap();
    assert!(result_pos < completed_pos);
    assert!(matches!(events.last(), Some(SessionEvent::Completed { .. })));
}

#[tokio::test]
async fn invalid_request_never_reaches_the_network() {
    let transport = ScriptedTransport::chunked(COMPLETE.as_bytes(), 64);
    let sender = sender_with(transport.clone());
    let request = SendJobRequest::builder().subject("no recipients").build();

    let err = sender.submit(&request).await.unwrap_err();

    assert_eq!(err.error_code(), "missing_recipients");
    assert_eq!(transport.open_count(), 0);
    let snapshot = sender.snapshot();
    assert_eq!(snapshot.phase, Phase::Error);
    assert_eq!(
        snapshot.last_error.as_deref(),
        Some("Please select a recipient Excel file.")
    );
}

#[tokio::test]
async fn oversized_attachment_is_rejected() {
    let transport = ScriptedTransport::chunked(COMPLETE.as_bytes(), 64);
    let sender = sender_with(transport.clone());
    let mut request = valid_request();
    request.attachment = Some(FileBlob::new("big.pdf", vec![0u8; 5 * 1024 * 1024]));

    let err = sender.submit(&request).await.unwrap_err();

    assert_eq!(err.error_code(), "attachment_too_large");
    assert_eq!(transport.open_count(), 0);
}

#[tokio::test]
async fn cancel_keeps_results_and_drops_later_frames() {
    let transport = ScriptedTransport::new(vec![
        ScriptStep::text(SENT_A),
        ScriptStep::text(SENT_B),
        ScriptStep::Hang,
        ScriptStep::text(SENT_C),
        ScriptStep::text(COMPLETE),
    ]);
    let sender = sender_with(transport);
    let mut rx = sender.subscribe();

    let task = {
        let sender = sender.clone();
        tokio::spawn(async move { sender.submit(&valid_request()).await })
    };

    wait_for(&mut rx, |e| {
        matches!(e, SessionEvent::Result { result, .. } if result.email == "b@x.com")
    })
    .await;
    assert!(sender.cancel());

    let snapshot = task.await.unwrap().unwrap();
    assert_eq!(snapshot.phase, Phase::Cancelled);
    assert_eq!(snapshot.results.len(), 2);
    assert_eq!(snapshot.counts, SendCounts::default());
    assert_eq!(snapshot.logs.last().unwrap().as_str(), CANCEL_LOG);
    assert!(snapshot.last_error.is_none());
}

#[tokio::test]
async fn cancel_twice_is_idempotent() {
    let sender = sender_with(ScriptedTransport::new(vec![ScriptStep::Hang]));
    let mut rx = sender.subscribe();

    let task = {
        let sender = sender.clone();
        tokio::spawn(async move { sender.submit(&valid_request()).await })
    };
    wait_for(&mut rx, |e| matches!(e, SessionEvent::Log { .. })).await;

    assert!(sender.cancel());
    assert!(!sender.cancel());

    let snapshot = task.await.unwrap().unwrap();
    let cancel_lines = snapshot
        .logs
        .iter()
        .filter(|l| l.as_str() == CANCEL_LOG)
        .count();
    assert_eq!(cancel_lines, 1);
}

#[tokio::test]
async fn cancel_when_idle_does_nothing() {
    let sender = sender_with(ScriptedTransport::default());
    assert!(!sender.cancel());
    assert_eq!(sender.phase(), Phase::Idle);
}

#[tokio::test]
async fn cancel_after_completion_does_nothing() {
    let body = [SENT_A, COMPLETE].concat();
    let sender = sender_with(ScriptedTransport::chunked(body.as_bytes(), 64));
    sender.submit(&valid_request()).await.unwrap();

    assert!(!sender.cancel());

    let snapshot = sender.snapshot();
    assert_eq!(snapshot.phase, Phase::Success);
    assert!(snapshot.logs.iter().all(|l| l.as_str() != CANCEL_LOG));
}

#[tokio::test]
async fn submit_while_sending_is_busy() {
    let transport = ScriptedTransport::new(vec![ScriptStep::Hang]);
    let sender = sender_with(transport.clone());
    let mut rx = sender.subscribe();

    let task = {
        let sender = sender.clone();
        tokio::spawn(async move { sender.submit(&valid_request()).await })
    };
    wait_for(&mut rx, |e| matches!(e, SessionEvent::Log { .. })).await;

    let err = sender.submit(&valid_request()).await.unwrap_err();
    assert!(matches!(err, Error::SessionBusy));
    assert_eq!(sender.phase(), Phase::Sending);

    sender.cancel();
    task.await.unwrap().unwrap();
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test]
async fn credential_failure_is_generic_for_the_user() {
    let transport = ScriptedTransport::chunked(COMPLETE.as_bytes(), 64);
    let sender = BulkSender::new(
        Config::default(),
        Arc::new(SignedOutProvider),
        Arc::new(transport.clone()),
    )
    .unwrap();

    let err = sender.submit(&valid_request()).await.unwrap_err();

    assert_eq!(err.error_code(), "credential_error");
    assert_eq!(transport.open_count(), 0);
    let snapshot = sender.snapshot();
    assert_eq!(snapshot.phase, Phase::Error);
    assert_eq!(snapshot.last_error.as_deref(), Some(GENERIC_FAILURE_MESSAGE));
    assert!(
        snapshot
            .logs
            .last()
            .unwrap()
            .as_str()
            .starts_with("--- CRITICAL ERROR: credential error")
    );
}

#[tokio::test]
async fn server_error_frame_is_shown_verbatim() {
    let body = [
        SENT_A,
        "data: {\"type\":\"error\",\"data\":{\"message\":\"Token expired\"}}\n\n",
        SENT_B,
    ]
    .concat();
    let sender = sender_with(ScriptedTransport::chunked(body.as_bytes(), 16));

    let err = sender.submit(&valid_request()).await.unwrap_err();

    assert!(matches!(err, Error::Server(ref m) if m == "Token expired"));
    let snapshot = sender.snapshot();
    assert_eq!(snapshot.phase, Phase::Error);
    assert_eq!(snapshot.last_error.as_deref(), Some("Token expired"));
    assert_eq!(snapshot.results.len(), 1);
    assert_eq!(snapshot.logs.last().unwrap().as_str(), "FATAL: Token expired");
}

#[tokio::test]
async fn unrecognized_delivery_status_is_recorded_as_failed() {
    let body = [
        "data: {\"type\":\"progress\",\"data\":{\"email\":\"q@x.com\",\"status\":\"skipped\",\"error\":\"bounce\"}}\n\n",
        "data: {\"type\":\"complete\",\"data\":{\"sent\":0,\"failed\":1,\"message\":\"Finished.\"}}\n\n",
    ]
    .concat();
    let sender = sender_with(ScriptedTransport::chunked(body.as_bytes(), 64));

    let snapshot = sender.submit(&valid_request()).await.unwrap();

    assert_eq!(snapshot.phase, Phase::Success);
    assert_eq!(snapshot.counts, SendCounts { sent: 0, failed: 1 });
    assert_eq!(snapshot.results.len(), 1);
    assert_eq!(snapshot.results[0].email, "q@x.com");
    assert_eq!(snapshot.results[0].status, DeliveryStatus::Failed);
    assert!(
        snapshot
            .logs
            .iter()
            .any(|l| l.as_str() == "ERROR: Failed to send to q@x.com: bounce")
    );
}

#[tokio::test]
async fn malformed_record_is_a_protocol_error() {
    let body = [SENT_A, "data: {not json\n\n", COMPLETE].concat();
    let sender = sender_with(ScriptedTransport::chunked(body.as_bytes(), 32));

    let err = sender.submit(&valid_request()).await.unwrap_err();

    assert_eq!(err.error_code(), "protocol_error");
    let snapshot = sender.snapshot();
    assert_eq!(snapshot.phase, Phase::Error);
    assert_eq!(snapshot.results.len(), 1);
    assert_eq!(snapshot.last_error.as_deref(), Some(GENERIC_FAILURE_MESSAGE));
}

#[tokio::test]
async fn stream_without_terminal_frame_fails() {
    let sender = sender_with(ScriptedTransport::chunked(SENT_A.as_bytes(), 64));

    let err = sender.submit(&valid_request()).await.unwrap_err();

    assert!(matches!(err, Error::StreamEnded));
    assert_eq!(sender.phase(), Phase::Error);
    assert_eq!(sender.snapshot().results[0].status, DeliveryStatus::Sent);
}

#[tokio::test]
async fn dangling_record_is_dropped_and_reported() {
    let body = [
        SENT_A,
        "data: {\"type\":\"complete\",\"data\":{\"sent\":1,\"failed\":0,\"message\":\"x\"}}",
    ]
    .concat();
    let sender = sender_with(ScriptedTransport::chunked(body.as_bytes(), 64));

    let err = sender.submit(&valid_request()).await.unwrap_err();

    assert!(matches!(err, Error::StreamEnded));
    let snapshot = sender.snapshot();
    assert_eq!(snapshot.counts, SendCounts::default());
    assert!(
        snapshot
            .logs
            .iter()
            .any(|l| l.as_str().starts_with("WARNING: stream ended with an incomplete record"))
    );
}

#[tokio::test]
async fn connection_drop_mid_stream_fails_the_attempt() {
    let transport = ScriptedTransport::new(vec![
        ScriptStep::text(SENT_A),
        ScriptStep::Fail("connection reset by peer".into()),
    ]);
    let sender = sender_with(transport);

    let err = sender.submit(&valid_request()).await.unwrap_err();

    assert_eq!(err.error_code(), "io_error");
    assert_eq!(sender.phase(), Phase::Error);
    assert_eq!(sender.snapshot().results.len(), 1);
}

#[tokio::test]
async fn resubmit_after_failure_starts_clean() {
    let sender = sender_with(ScriptedTransport::chunked(
        [SENT_A, COMPLETE].concat().as_bytes(),
        64,
    ));
    sender
        .submit(&SendJobRequest::builder().build())
        .await
        .unwrap_err();

    let snapshot = sender.submit(&valid_request()).await.unwrap();

    assert_eq!(snapshot.attempt, 2);
    assert_eq!(snapshot.phase, Phase::Success);
    assert!(snapshot.last_error.is_none());
}

#[tokio::test]
async fn dropped_submission_is_cancelled() {
    let sender = sender_with(ScriptedTransport::new(vec![ScriptStep::Hang]));

    let waited = tokio::time::timeout(
        Duration::from_millis(50),
        sender.submit(&valid_request()),
    )
    .await;

    assert!(waited.is_err());
    assert_eq!(sender.phase(), Phase::Cancelled);
    assert!(!sender.cancel());
}

#[tokio::test]
async fn clear_resets_after_success() {
    let sender = sender_with(ScriptedTransport::chunked(
        [SENT_A, COMPLETE].concat().as_bytes(),
        64,
    ));
    sender.submit(&valid_request()).await.unwrap();

    sender.clear().unwrap();

    let snapshot = sender.snapshot();
    assert_eq!(snapshot.phase, Phase::Idle);
    assert!(snapshot.logs.is_empty());
    assert!(snapshot.results.is_empty());
    assert_eq!(sender.report_csv(), crate::report::REPORT_HEADER);
}

#[tokio::test]
async fn export_report_writes_results() {
    let dir = tempfile::tempdir().unwrap();
    let sender = sender_with(ScriptedTransport::chunked(
        [SENT_A, COMPLETE].concat().as_bytes(),
        64,
    ));

    assert!(matches!(
        sender.export_report(dir.path()).await,
        Err(Error::EmptyReport)
    ));

    sender.submit(&valid_request()).await.unwrap();
    let path = sender.export_report(dir.path()).await.unwrap();
    let content = tokio::fs::read_to_string(path).await.unwrap();
    assert!(content.starts_with("Email,Status,Timestamp\na@x.com,sent,"));
}

#[test]
fn invalid_config_is_rejected() {
    let config = Config {
        event_channel_capacity: 0,
        ..Default::default()
    };
    let result = BulkSender::new(
        config,
        Arc::new(StaticTokenProvider::new("t")),
        Arc::new(ScriptedTransport::default()),
    );
    assert!(result.is_err());
}
