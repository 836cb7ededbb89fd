//! Daemon IPC message types
//!
//! Shared by the daemon's socket server and the CLI client. One JSON object
//! per line, discriminated by a `type` field:
//! - `{"type": "app_statistics", "app": "firefox", "limit": 20}`
//! - `{"type": "total_presses"}`
//! - `{"type": "status"}`

use std::path::PathBuf;

use nix::libc;
use serde::{Deserialize, Serialize};

use crate::capture::CaptureStats;
use crate::event::CaptureEvent;

/// Socket file name inside `$XDG_RUNTIME_DIR`
pub const SOCKET_NAME: &str = "keytally.sock";

/// Request messages sent from the CLI to the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcRequest {
    /// Ranked durable statistics for one application, every row if no limit
    AppStatistics {
        app: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
    /// Every application with recorded presses
    AllApps,
    /// Delete all durable statistics and the recent history
    ClearStatistics,
    /// Combinations ranked across all applications
    TopKeyPresses { limit: usize },
    /// Durable press total, for one app or overall
    TotalPresses {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        app: Option<String>,
    },
    /// Most recent captured events, newest first
    Recent { count: usize },
    /// Busiest applications in the recent history
    TopApps { limit: usize },
    /// Most used combinations in the recent history
    TopSignatures {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        app: Option<String>,
        limit: usize,
    },
    /// Text overview of the recent history
    Summary,
    /// Write the full report to a file (the configured path if omitted)
    Export {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
    /// Query overall daemon status
    Status,
}

/// Response messages sent from the daemon back to the CLI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcResponse {
    Success {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Pre-formatted report text
    Text { text: String },
    Apps { apps: Vec<String> },
    Cleared { ok: bool },
    /// Press total; `-1` when the store could not be queried
    Count { count: i64 },
    Recent { events: Vec<CaptureEvent> },
    Ranking { entries: Vec<RankEntry> },
    Status(DaemonStatus),
    Error { message: String },
}

/// A name with its press count
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankEntry {
    pub name: String,
    pub count: u64,
}

impl From<(String, u64)> for RankEntry {
    fn from((name, count): (String, u64)) -> Self {
        Self { name, count }
    }
}

/// A keyboard the daemon is reading from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceStatus {
    pub name: String,
    /// Device path (e.g., /dev/input/event5)
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaemonStatus {
    pub devices: Vec<DeviceStatus>,
    /// Application that currently has focus, if known
    pub focused_app: Option<String>,
    pub database: Option<PathBuf>,
    pub capture: CaptureStats,
    /// Events waiting in the channel
    pub queued: usize,
    pub ingested: u64,
    pub failed_writes: u64,
    pub history_len: usize,
    pub history_capacity: usize,
}

/// Where the daemon listens.
///
/// Prefers `$XDG_RUNTIME_DIR/keytally.sock`, otherwise falls back to
/// `/tmp/keytally-$UID.sock`.
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join(SOCKET_NAME)
    } else {
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/keytally-{}.sock", uid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = IpcRequest::AppStatistics {
            app: "firefox".to_string(),
            limit: Some(20),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"type":"app_statistics","app":"firefox","limit":20}"#);

        let json = serde_json::to_string(&IpcRequest::TotalPresses { app: None }).unwrap();
        assert_eq!(json, r#"{"type":"total_presses"}"#);

        let json = serde_json::to_string(&IpcRequest::ClearStatistics).unwrap();
        assert_eq!(json, r#"{"type":"clear_statistics"}"#);
    }

    #[test]
    fn test_request_deserialization_with_optional_fields() {
        let request: IpcRequest =
            serde_json::from_str(r#"{"type": "top_signatures", "limit": 5}"#).unwrap();
        assert_eq!(request, IpcRequest::TopSignatures { app: None, limit: 5 });

        let request: IpcRequest =
            serde_json::from_str(r#"{"type": "app_statistics", "app": "Notepad"}"#).unwrap();
        assert_eq!(
            request,
            IpcRequest::AppStatistics {
                app: "Notepad".to_string(),
                limit: None
            }
        );

        let request: IpcRequest =
            serde_json::from_str(r#"{"type": "export", "path": "/tmp/out.txt"}"#).unwrap();
        assert_eq!(
            request,
            IpcRequest::Export {
                path: Some(PathBuf::from("/tmp/out.txt"))
            }
        );

        assert!(serde_json::from_str::<IpcRequest>(r#"{"type": "reboot"}"#).is_err());
    }

    #[test]
    fn test_response_serialization() {
        let response = IpcResponse::Ranking {
            entries: vec![("Ctrl+S".to_string(), 3).into()],
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(
            json,
            r#"{"type":"ranking","entries":[{"name":"Ctrl+S","count":3}]}"#
        );

        let response = IpcResponse::Count { count: -1 };
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"type":"count","count":-1}"#
        );
    }

    #[test]
    fn test_status_response_is_flattened() {
        let response = IpcResponse::Status(DaemonStatus {
            devices: vec![DeviceStatus {
                name: "AT Translated Set 2 keyboard".to_string(),
                path: PathBuf::from("/dev/input/event3"),
            }],
            focused_app: Some("Alacritty".to_string()),
            database: None,
            capture: CaptureStats::default(),
            queued: 0,
            ingested: 12,
            failed_writes: 0,
            history_len: 12,
            history_capacity: 1000,
        });
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.starts_with(r#"{"type":"status","devices":"#));
        assert!(json.contains(r#""focused_app":"Alacritty""#));

        let parsed: IpcResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_default_socket_path_prefers_runtime_dir() {
        let path = default_socket_path();
        match std::env::var("XDG_RUNTIME_DIR") {
            Ok(dir) => assert_eq!(path, PathBuf::from(dir).join(SOCKET_NAME)),
            Err(_) => {
                let name = path.file_name().unwrap().to_string_lossy();
                assert!(name.starts_with("keytally-") && name.ends_with(".sock"));
            }
        }
    }
}
