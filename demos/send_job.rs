//! Send job example
//!
//! Streams a bulk mail job and prints session events as they arrive.
//!
//! ```bash
//! # Offline: replays a canned progress stream
//! cargo run --example send_job -- --offline
//!
//! # Against a running mail API (BULK_MAILER_API_URL, BULK_MAILER_TOKEN)
//! cargo run --example send_job -- recipients.xlsx [attachment.pdf]
//! ```
//!
//! Press Ctrl+C while sending to cancel the job.

use bulk_mailer::transport::{ScriptStep, ScriptedTransport};
use bulk_mailer::{
    BulkSender, Config, FileBlob, SendJobRequest, SessionEvent, StaticTokenProvider,
    cancel_on_shutdown,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bulk_mailer=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let offline = args.iter().any(|a| a == "--offline");
    let config = Config::from_env()?;

    let (sender, request) = if offline {
        let sender = BulkSender::new(
            config.clone(),
            Arc::new(StaticTokenProvider::new("offline")),
            Arc::new(offline_transport()),
        )?;
        let request = SendJobRequest::builder()
            .recipients(FileBlob::new("demo.csv", b"email\na@example.com\n".to_vec()))
            .subject(config.default_subject.clone())
            .body_text("Hello from the offline demo")
            .delay_secs(config.default_delay_secs)
            .build();
        (sender, request)
    } else {
        let Some(recipients) = args.first() else {
            eprintln!("usage: send_job <recipients.xlsx> [attachment] | --offline");
            std::process::exit(2);
        };
        let tokens = Arc::new(StaticTokenProvider::from_env("BULK_MAILER_TOKEN")?);
        let sender = BulkSender::with_http(config.clone(), tokens)?;

        let mut builder = SendJobRequest::builder()
            .recipients(FileBlob::from_path(recipients).await?)
            .subject(config.default_subject.clone())
            .body_text("Hello everyone,\n\nPlease see the attached update.")
            .delay_secs(config.default_delay_secs);
        if let Some(attachment) = args.get(1) {
            builder = builder.attachment(FileBlob::from_path(attachment).await?);
        }
        (sender, builder.build())
    };

    let mut events = sender.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::Log { line, .. } => println!("{line}"),
                SessionEvent::PhaseChanged { phase, .. } => println!("[phase] {phase}"),
                _ => {}
            }
        }
    });
    tokio::spawn(cancel_on_shutdown(sender.clone()));

    match sender.submit(&request).await {
        Ok(snapshot) => {
            println!(
                "\n{}: {} sent, {} failed",
                snapshot.phase, snapshot.counts.sent, snapshot.counts.failed
            );
            if !snapshot.results.is_empty() {
                let path = sender.export_report(std::env::temp_dir()).await?;
                println!("Report written to {}", path.display());
            }
        }
        Err(e) => {
            eprintln!("\n{}", e.user_message());
            std::process::exit(1);
        }
    }

    Ok(())
}

fn offline_transport() -> ScriptedTransport {
    let records = [
        r#"data: {"type":"log","data":"Loaded 3 recipients."}"#,
        r#"data: {"type":"progress","data":{"email":"a@example.com","status":"sent"}}"#,
        r#"data: {"type":"progress","data":{"email":"b@example.com","status":"failed","error":"Mailbox unavailable"}}"#,
        r#"data: {"type":"progress","data":{"email":"c@example.com","status":"sent"}}"#,
        r#"data: {"type":"complete","data":{"sent":2,"failed":1,"message":"All emails processed."}}"#,
    ];

    let mut steps = Vec::new();
    for record in records {
        steps.push(ScriptStep::Pause(Duration::from_millis(400)));
        steps.push(ScriptStep::text(format!("{record}\n\n")));
    }
    ScriptedTransport::new(steps)
}
