//! Niri IPC errors

use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to the niri compositor.
///
/// None of these stop the daemon; focus tracking degrades to the unknown
/// application instead.
#[derive(Debug, Error)]
pub enum NiriError {
    #[error("NIRI_SOCKET environment variable not set - is niri running?")]
    SocketNotSet,

    #[error("Niri socket not found at {path}")]
    SocketNotFound { path: PathBuf },

    #[error("Failed to connect to niri socket at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to send request to niri: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("Failed to read from niri: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    #[error("Failed to encode niri request: {0}")]
    Encode(#[source] serde_json::Error),

    /// A line niri sent that this build cannot decode, typically a newer event kind
    #[error("Failed to decode niri message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Niri rejected the request: {message}")]
    Rejected { message: String },

    #[error("Unexpected response to {request} request")]
    UnexpectedResponse { request: &'static str },

    #[error("Connection to niri closed")]
    ConnectionClosed,

    #[error("Niri unreachable after {attempts} attempt(s)")]
    Unreachable { attempts: u32 },
}
