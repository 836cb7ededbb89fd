//! Niri IPC client implementation
//!
//! Handles socket discovery, connection management, and the JSON
//! request/response protocol.

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::sleep;
use tracing::warn;

use super::types::Window;
use super::error::NiriError;

/// Initial delay between retry attempts (100ms)
const INITIAL_RETRY_DELAY_MS: u64 = 100;

/// Maximum delay between retry attempts (1 second)
const MAX_RETRY_DELAY_MS: u64 = 1000;

/// Environment variable name for the niri socket path
pub(crate) const NIRI_SOCKET_ENV: &str = "NIRI_SOCKET";

/// Discover the niri IPC socket path from the environment
///
/// # Errors
///
/// Returns `NiriError::SocketNotSet` if `$NIRI_SOCKET` is not set.
/// Returns `NiriError::SocketNotFound` if the path doesn't exist.
pub fn get_socket_path() -> Result<PathBuf, NiriError> {
    let socket_path_str = std::env::var(NIRI_SOCKET_ENV).map_err(|_| NiriError::SocketNotSet)?;

    let socket_path = PathBuf::from(&socket_path_str);

    if !socket_path.exists() {
        return Err(NiriError::SocketNotFound { path: socket_path });
    }

    Ok(socket_path)
}

/// Request/response connection to the niri compositor
#[derive(Debug)]
pub struct NiriClient {
    socket: UnixStream,
}

impl NiriClient {
    /// Connect to the socket named by `$NIRI_SOCKET`
    pub async fn connect() -> Result<Self, NiriError> {
        let socket_path = get_socket_path()?;

        let socket = UnixStream::connect(&socket_path)
            .await
            .map_err(|e| NiriError::ConnectionFailed {
                path: socket_path.clone(),
                source: e,
            })?;

        Ok(Self { socket })
    }

    /// Connect with exponential backoff (100ms doubling up to 1s).
    ///
    /// `max_retries` of 0 means a single attempt. `SocketNotSet` is returned
    /// immediately since waiting will not make the variable appear.
    pub async fn connect_with_retry(max_retries: u32) -> Result<Self, NiriError> {
        let mut attempt = 0;
        let mut delay_ms = INITIAL_RETRY_DELAY_MS;
        let last_error = loop {
            attempt += 1;

            match Self::connect().await {
                Ok(client) => return Ok(client),
                Err(e) => {
                    if matches!(e, NiriError::SocketNotSet) {
                        return Err(e);
                    }

                    if attempt > max_retries {
                        break e;
                    }

                    warn!(
                        attempt = attempt,
                        max_retries = max_retries,
                        delay_ms = delay_ms,
                        "Niri IPC connection failed, retrying..."
                    );

                    sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = (delay_ms * 2).min(MAX_RETRY_DELAY_MS);
                }
            }
        };

        warn!(
            attempts = attempt,
            last_error = %last_error,
            "Failed to connect to niri after all retry attempts"
        );

        Err(NiriError::Unreachable { attempts: attempt })
    }

    /// Send one request and read its reply.
    ///
    /// Niri uses a JSON-over-newline protocol: the client writes the request
    /// followed by a newline, and the server answers with `{"Ok":...}` or
    /// `{"Err":"..."}` on a single line.
    pub async fn send_request(
        &mut self,
        request: niri_ipc::Request,
    ) -> Result<niri_ipc::Response, NiriError> {
        let request_json = serde_json::to_string(&request).map_err(NiriError::Encode)?;

        self.socket
            .write_all(request_json.as_bytes())
            .await
            .map_err(NiriError::SendFailed)?;
        self.socket
            .write_all(b"\n")
            .await
            .map_err(NiriError::SendFailed)?;
        self.socket.flush().await.map_err(NiriError::SendFailed)?;

        let (read_half, _write_half) = self.socket.split();
        let mut reader = BufReader::new(read_half);
        let mut response_line = String::new();

        let bytes_read = reader
            .read_line(&mut response_line)
            .await
            .map_err(NiriError::ReceiveFailed)?;

        if bytes_read == 0 {
            return Err(NiriError::ConnectionClosed);
        }

        let reply: niri_ipc::Reply =
            serde_json::from_str(&response_line).map_err(NiriError::Decode)?;

        reply.map_err(|message| NiriError::Rejected { message })
    }

    /// The focused window, or `None` when nothing has focus
    pub async fn get_focused_window(&mut self) -> Result<Option<Window>, NiriError> {
        match self.send_request(niri_ipc::Request::FocusedWindow).await? {
            niri_ipc::Response::FocusedWindow(window) => Ok(window.map(Window::from)),
            _ => Err(NiriError::UnexpectedResponse {
                request: "FocusedWindow",
            }),
        }
    }

    /// Every window across all workspaces
    pub async fn get_windows(&mut self) -> Result<Vec<Window>, NiriError> {
        match self.send_request(niri_ipc::Request::Windows).await? {
            niri_ipc::Response::Windows(windows) => {
                Ok(windows.into_iter().map(Window::from).collect())
            }
            _ => Err(NiriError::UnexpectedResponse { request: "Windows" }),
        }
    }
}
