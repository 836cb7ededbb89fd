//! Answering requests straight from the database, without the daemon
//!
//! Only the durable statistics are available this way. Recent activity lives
//! in the daemon's memory and is reported as an error.

use std::path::Path;

use keytally_core::protocol::{IpcRequest, IpcResponse};
use keytally_core::{report, StatsStore};

pub fn handle(store: &StatsStore, request: IpcRequest, export_path: &Path) -> IpcResponse {
    match request {
        IpcRequest::AppStatistics { app, limit } => IpcResponse::Text {
            text: report::app_statistics(store, &app, limit),
        },
        IpcRequest::AllApps => IpcResponse::Apps {
            apps: report::all_apps(store),
        },
        IpcRequest::ClearStatistics => IpcResponse::Cleared {
            ok: report::clear_statistics(store),
        },
        IpcRequest::TopKeyPresses { limit } => IpcResponse::Text {
            text: report::top_key_presses(store, limit),
        },
        IpcRequest::TotalPresses { app } => IpcResponse::Count {
            count: match app {
                Some(app) => report::app_key_press_count(store, &app),
                None => report::total_key_presses(store),
            },
        },
        IpcRequest::Export { path } => {
            let path = path.as_deref().unwrap_or(export_path);
            match report::write_export(store, path) {
                Ok(()) => IpcResponse::Success {
                    message: Some(format!("Exported statistics to {}", path.display())),
                },
                Err(e) => IpcResponse::Error {
                    message: format!("Failed to export to {}: {}", path.display(), e),
                },
            }
        }
        IpcRequest::Recent { .. }
        | IpcRequest::TopApps { .. }
        | IpcRequest::TopSignatures { .. }
        | IpcRequest::Summary
        | IpcRequest::Status => IpcResponse::Error {
            message: "Recent activity is only available from the running daemon (drop --database)"
                .to_string(),
        },
    }
}
