//! IPC server for daemon communication
//!
//! Provides a Unix domain socket for the CLI to query statistics from the
//! running daemon. One JSON request per connection, one JSON response back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use keytally_core::protocol::{
    default_socket_path, DaemonStatus, DeviceStatus, IpcRequest, IpcResponse, RankEntry,
};
use keytally_core::{report, CaptureBridge, EventSender, ForegroundSlot, StatsEngine};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

// ============================================================================
// IPC Server
// ============================================================================

/// IPC server for daemon communication via Unix domain socket
///
/// The socket file is automatically removed when the server is dropped.
pub struct IpcServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl IpcServer {
    /// Bind at the default location (see [`default_socket_path`])
    pub fn new() -> Result<Self> {
        Self::bind(default_socket_path())
    }

    /// Bind at `socket_path`, replacing a stale socket file from a previous run
    pub fn bind(socket_path: PathBuf) -> Result<Self> {
        tracing::info!("IPC socket path: {}", socket_path.display());

        if socket_path.exists() {
            tracing::debug!("Removing stale socket file: {}", socket_path.display());
            std::fs::remove_file(&socket_path).with_context(|| {
                format!(
                    "Failed to remove stale socket file: {}",
                    socket_path.display()
                )
            })?;
        }

        let listener = UnixListener::bind(&socket_path).with_context(|| {
            format!("Failed to create IPC socket at {}", socket_path.display())
        })?;

        tracing::info!("IPC server listening on {}", socket_path.display());

        Ok(Self {
            listener,
            socket_path,
        })
    }

    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept IPC connection")?;

        tracing::debug!("Accepted IPC connection");

        Ok(stream)
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                tracing::warn!("Failed to remove IPC socket file on shutdown: {}", e);
            } else {
                tracing::debug!("Removed IPC socket file: {}", self.socket_path.display());
            }
        }
    }
}

// ============================================================================
// IPC Connection Handler
// ============================================================================

/// Handle an incoming IPC connection.
///
/// Reads one line of JSON, parses it as an [`IpcRequest`], runs `handler` on
/// it and writes the [`IpcResponse`] back followed by a newline. A request
/// that does not parse is answered with [`IpcResponse::Error`].
///
/// `handler` runs on tokio's blocking pool since answering a request touches
/// SQLite and the filesystem.
pub async fn handle_ipc_connection<F>(mut stream: UnixStream, handler: F) -> Result<()>
where
    F: FnOnce(IpcRequest) -> IpcResponse + Send + 'static,
{
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);

    let mut line = String::new();
    let bytes_read = reader
        .read_line(&mut line)
        .await
        .context("Failed to read IPC request")?;

    if bytes_read == 0 {
        tracing::debug!("IPC connection closed without data");
        return Ok(());
    }

    let line = line.trim();

    tracing::debug!("Received IPC request: {}", line);

    let response = match serde_json::from_str::<IpcRequest>(line) {
        Ok(request) => {
            tracing::debug!("Parsed IPC request: {:?}", request);
            match tokio::task::spawn_blocking(move || handler(request)).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!("IPC request handler failed: {}", e);
                    IpcResponse::Error {
                        message: "Request handler failed".to_string(),
                    }
                }
            }
        }
        Err(e) => {
            tracing::warn!("Failed to parse IPC request: {}", e);
            IpcResponse::Error {
                message: format!("Invalid request: {}", e),
            }
        }
    };

    let response_json =
        serde_json::to_string(&response).context("Failed to serialize IPC response")?;

    writer
        .write_all(response_json.as_bytes())
        .await
        .context("Failed to write IPC response")?;
    writer
        .write_all(b"\n")
        .await
        .context("Failed to write newline")?;
    writer.flush().await.context("Failed to flush IPC response")?;

    Ok(())
}

// ============================================================================
// Request dispatch
// ============================================================================

/// Everything a request may need to look at, shared across connections
#[derive(Clone)]
pub struct RequestHandler {
    engine: Arc<Mutex<StatsEngine>>,
    bridge: Arc<CaptureBridge>,
    focus: Arc<ForegroundSlot>,
    queue: EventSender,
    devices: Vec<DeviceStatus>,
    export_path: PathBuf,
}

impl RequestHandler {
    pub fn new(
        engine: Arc<Mutex<StatsEngine>>,
        bridge: Arc<CaptureBridge>,
        focus: Arc<ForegroundSlot>,
        queue: EventSender,
        devices: Vec<DeviceStatus>,
        export_path: PathBuf,
    ) -> Self {
        Self {
            engine,
            bridge,
            focus,
            queue,
            devices,
            export_path,
        }
    }

    pub fn handle(&self, request: IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::AppStatistics { app, limit } => IpcResponse::Text {
                text: report::app_statistics(self.engine.lock().store(), &app, limit),
            },
            IpcRequest::AllApps => IpcResponse::Apps {
                apps: report::all_apps(self.engine.lock().store()),
            },
            IpcRequest::ClearStatistics => self.clear(),
            IpcRequest::TopKeyPresses { limit } => IpcResponse::Text {
                text: report::top_key_presses(self.engine.lock().store(), limit),
            },
            IpcRequest::TotalPresses { app } => {
                let engine = self.engine.lock();
                let count = match app {
                    Some(app) => report::app_key_press_count(engine.store(), &app),
                    None => report::total_key_presses(engine.store()),
                };
                IpcResponse::Count { count }
            }
            IpcRequest::Recent { count } => IpcResponse::Recent {
                events: self.engine.lock().history().recent(count),
            },
            IpcRequest::TopApps { limit } => {
                ranking(self.engine.lock().history().top_apps(limit))
            }
            IpcRequest::TopSignatures { app, limit } => {
                let engine = self.engine.lock();
                ranking(match app {
                    Some(app) => engine.history().top_signatures_for_app(&app, limit),
                    None => engine.history().top_signatures(limit),
                })
            }
            IpcRequest::Summary => IpcResponse::Text {
                text: self.engine.lock().history().summary(),
            },
            IpcRequest::Export { path } => {
                self.export(path.as_deref().unwrap_or(&self.export_path))
            }
            IpcRequest::Status => IpcResponse::Status(self.status()),
        }
    }

    fn clear(&self) -> IpcResponse {
        match self.engine.lock().clear_all() {
            Ok(rows) => {
                tracing::info!("Cleared {} statistics row(s)", rows);
                IpcResponse::Cleared { ok: true }
            }
            Err(e) => {
                tracing::warn!("Failed to clear statistics: {}", e);
                IpcResponse::Cleared { ok: false }
            }
        }
    }

    fn export(&self, path: &Path) -> IpcResponse {
        match report::write_export(self.engine.lock().store(), path) {
            Ok(()) => IpcResponse::Success {
                message: Some(format!("Exported statistics to {}", path.display())),
            },
            Err(e) => IpcResponse::Error {
                message: format!("Failed to export to {}: {}", path.display(), e),
            },
        }
    }

    fn status(&self) -> DaemonStatus {
        let engine = self.engine.lock();
        DaemonStatus {
            devices: self.devices.clone(),
            focused_app: self.focus.get().map(|app| app.to_string()),
            database: engine.store().path().map(Path::to_path_buf),
            capture: self.bridge.stats(),
            queued: self.queue.len(),
            ingested: engine.ingested(),
            failed_writes: engine.failed(),
            history_len: engine.history().len(),
            history_capacity: engine.history().capacity(),
        }
    }
}

fn ranking(entries: Vec<(String, u64)>) -> IpcResponse {
    IpcResponse::Ranking {
        entries: entries.into_iter().map(RankEntry::from).collect(),
    }
}
