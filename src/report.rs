//! CSV export of per-recipient results.

use crate::error::{Error, Result};
use crate::types::RecipientResult;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};

/// First line of every report
pub const REPORT_HEADER: &str = "Email,Status,Timestamp";

/// Time-of-day format used in the `Timestamp` column
pub const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

/// Render results as CSV
///
/// One row per result in arrival order, joined with `\n` and no trailing
/// newline. Fields are written as-is; addresses never contain commas or quotes.
pub fn to_csv(results: &[RecipientResult]) -> String {
    let mut lines = Vec::with_capacity(results.len() + 1);
    lines.push(REPORT_HEADER.to_string());
    lines.extend(results.iter().map(|r| {
        format!(
            "{},{},{}",
            r.email,
            r.status,
            r.received_at.format(TIMESTAMP_FORMAT)
        )
    }));
    lines.join("\n")
}

/// File name for a report generated at `at`
///
/// `mail_report_<ISO-8601 UTC>.csv` with `:` and `.` replaced by `-`, e.g.
/// `mail_report_2024-05-01T10-00-00-000Z.csv`.
pub fn report_file_name(at: DateTime<Utc>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("mail_report_{stamp}.csv")
}

/// Write the report for `results` into `dir`
///
/// Returns the path of the written file.
///
/// # Errors
///
/// Returns [`Error::EmptyReport`] when there is nothing to export, or an I/O
/// error if the file cannot be written.
pub async fn write_report(dir: impl AsRef<Path>, results: &[RecipientResult]) -> Result<PathBuf> {
    if results.is_empty() {
        return Err(Error::EmptyReport);
    }

    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(report_file_name(Utc::now()));
    tokio::fs::write(&path, to_csv(results)).await?;

    tracing::info!(path = %path.display(), rows = results.len(), "Wrote delivery report");
    Ok(path)
}
