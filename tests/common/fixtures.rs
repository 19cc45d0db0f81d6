//! Stream bodies, requests and senders for integration tests

use bulk_mailer::{
    BulkSender, Config, FileBlob, SendJobRequest, StaticTokenProvider, StreamFrame,
    frame::{CompletePayload, ErrorPayload, ProgressPayload},
    types::DeliveryStatus,
};
use std::sync::Arc;
use wiremock::MockServer;

/// Token the fixtures authenticate with
pub const TEST_TOKEN: &str = "integration-token";

/// `data:` record for a log frame
pub fn log_record(text: &str) -> String {
    record(StreamFrame::Log(text.to_string()))
}

/// `data:` record for a progress frame
pub fn progress_record(email: &str, status: DeliveryStatus, error: Option<&str>) -> String {
    record(StreamFrame::Progress(ProgressPayload {
        email: email.to_string(),
        status,
        error: error.map(str::to_string),
    }))
}

/// `data:` record for a complete frame
pub fn complete_record(sent: u64, failed: u64) -> String {
    record(StreamFrame::Complete(CompletePayload {
        sent,
        failed,
        message: "All emails processed.".to_string(),
    }))
}

/// `data:` record for a server error frame
pub fn error_record(message: &str) -> String {
    record(StreamFrame::Error(ErrorPayload {
        message: message.to_string(),
    }))
}

fn record(frame: StreamFrame) -> String {
    frame.to_record().unwrap()
}

/// A request that passes validation
pub fn valid_request() -> SendJobRequest {
    SendJobRequest::builder()
        .recipients(FileBlob::new(
            "recipients.xlsx",
            b"PK\x03\x04 not really a workbook".to_vec(),
        ))
        .attachment(FileBlob::new("notice.pdf", b"%PDF-1.7".to_vec()))
        .subject("Important Company Update")
        .body_text("Hello team")
        .delay_secs(1)
        .build()
}

/// Config pointing at a mock server's `/api`
pub fn config_for(server: &MockServer) -> Config {
    Config {
        api_base_url: format!("{}/api", server.uri()),
        ..Default::default()
    }
}

/// HTTP sender against a mock server
pub fn http_sender(server: &MockServer) -> BulkSender {
    BulkSender::with_http(
        config_for(server),
        Arc::new(StaticTokenProvider::new(TEST_TOKEN)),
    )
    .unwrap()
}
