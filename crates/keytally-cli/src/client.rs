//! Blocking client for the daemon socket

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use keytally_core::protocol::{IpcRequest, IpcResponse};
use thiserror::Error;

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("keytally daemon is not reachable at {path}: {source} (is keytallyd running?)")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IPC I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed IPC message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Daemon closed the connection without answering")]
    NoResponse,
}

/// Send one request and wait for its response
pub fn send(socket_path: &Path, request: &IpcRequest) -> Result<IpcResponse, ClientError> {
    let mut stream = UnixStream::connect(socket_path).map_err(|source| ClientError::Connect {
        path: socket_path.to_path_buf(),
        source,
    })?;
    stream.set_read_timeout(Some(TIMEOUT))?;
    stream.set_write_timeout(Some(TIMEOUT))?;

    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    stream.write_all(line.as_bytes())?;
    stream.flush()?;

    let mut reader = BufReader::new(stream);
    let mut response = String::new();
    if reader.read_line(&mut response)? == 0 {
        return Err(ClientError::NoResponse);
    }

    tracing::debug!("Daemon answered: {}", response.trim());
    Ok(serde_json::from_str(response.trim())?)
}
