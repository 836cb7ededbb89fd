//! Turning daemon responses into terminal output

use std::fmt::Write as _;

use chrono::{DateTime, Local};
use keytally_core::protocol::{DaemonStatus, IpcResponse, RankEntry};
use keytally_core::CaptureEvent;

/// Render a response for printing.
///
/// `Err` carries the message of an [`IpcResponse::Error`] or a failed clear.
pub fn render(response: IpcResponse) -> Result<String, String> {
    match response {
        IpcResponse::Success { message } => Ok(message.unwrap_or_else(|| "OK".to_string())),
        IpcResponse::Text { text } => Ok(text.trim_end().to_string()),
        IpcResponse::Apps { apps } if apps.is_empty() => {
            Ok("No applications recorded yet.".to_string())
        }
        IpcResponse::Apps { apps } => Ok(apps.join("\n")),
        IpcResponse::Cleared { ok: true } => Ok("All statistics cleared.".to_string()),
        IpcResponse::Cleared { ok: false } => Err("Failed to clear statistics".to_string()),
        IpcResponse::Count { count } if count < 0 => {
            Err("Statistics database could not be queried".to_string())
        }
        IpcResponse::Count { count } => Ok(count.to_string()),
        IpcResponse::Recent { events } => Ok(recent(&events)),
        IpcResponse::Ranking { entries } => Ok(ranking(&entries)),
        IpcResponse::Status(status) => Ok(status_report(&status)),
        IpcResponse::Error { message } => Err(message),
    }
}

fn recent(events: &[CaptureEvent]) -> String {
    if events.is_empty() {
        return "No recent key presses.".to_string();
    }

    let mut out = String::new();
    for event in events {
        let time = i64::try_from(event.timestamp_ms)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());
        let _ = writeln!(out, "{}  {:<25} {}", time, event.signature, event.app_name);
    }
    out.trim_end().to_string()
}

fn ranking(entries: &[RankEntry]) -> String {
    if entries.is_empty() {
        return "No recent key presses.".to_string();
    }

    let mut out = String::new();
    for (rank, entry) in entries.iter().enumerate() {
        let _ = writeln!(out, "{:>2}. {:<25}{:>6}", rank + 1, entry.name, entry.count);
    }
    out.trim_end().to_string()
}

fn status_report(status: &DaemonStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Daemon status:");
    let _ = writeln!(
        out,
        "  Focused app: {}",
        status.focused_app.as_deref().unwrap_or("<unknown>")
    );
    if let Some(database) = &status.database {
        let _ = writeln!(out, "  Database: {}", database.display());
    }
    let _ = writeln!(
        out,
        "  Captured: {} (ignored {}, dropped {})",
        status.capture.captured, status.capture.ignored, status.capture.dropped
    );
    let _ = writeln!(
        out,
        "  Stored: {} ({} failed write(s), {} queued)",
        status.ingested, status.failed_writes, status.queued
    );
    let _ = writeln!(
        out,
        "  History: {}/{}",
        status.history_len, status.history_capacity
    );

    if status.devices.is_empty() {
        let _ = writeln!(out, "\nNo keyboards are being read.");
    } else {
        let _ = writeln!(out, "\nKeyboards:");
        for device in &status.devices {
            let _ = writeln!(out, "  {}", device.name);
            let _ = writeln!(out, "    Path: {}", device.path.display());
        }
    }
    out.trim_end().to_string()
}
