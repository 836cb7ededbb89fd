//! Niri IPC event stream
//!
//! A one-way connection that continuously receives compositor events.
//!
//! ## Protocol
//!
//! 1. Connect to the niri socket (separate connection from NiriClient)
//! 2. Send `Request::EventStream` as JSON + newline
//! 3. Receive initial `Ok(Handled)` response
//! 4. Continuously receive `Event` messages (one JSON per line)
//!
//! ## Reconnection
//!
//! Backoff starts at 500ms, doubles each retry and caps at 10 seconds. When
//! every retry fails, focus tracking is disabled and the daemon keeps
//! counting under the unknown application.

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::sleep;
use tracing::{info, warn};

use super::client::get_socket_path;
use super::error::NiriError;

/// Default number of reconnection retry attempts for event stream
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 5;

/// Initial delay between retry attempts (500ms)
const INITIAL_RETRY_DELAY_MS: u64 = 500;

/// Maximum delay between retry attempts (10 seconds)
const MAX_RETRY_DELAY_MS: u64 = 10_000;

#[derive(Debug)]
pub struct NiriEventStream {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    socket_path: PathBuf,
}

impl NiriEventStream {
    /// Connect to niri and subscribe to events
    pub async fn connect() -> Result<Self, NiriError> {
        let socket_path = get_socket_path()?;
        Self::connect_to(socket_path).await
    }

    pub(crate) async fn connect_to(socket_path: PathBuf) -> Result<Self, NiriError> {
        let socket = UnixStream::connect(&socket_path)
            .await
            .map_err(|e| NiriError::ConnectionFailed {
                path: socket_path.clone(),
                source: e,
            })?;

        // Owned halves: the reader lives as long as the stream
        let (read_half, mut write_half) = socket.into_split();

        let request_json = serde_json::to_string(&niri_ipc::Request::EventStream)
            .map_err(NiriError::Encode)?;

        write_half
            .write_all(request_json.as_bytes())
            .await
            .map_err(NiriError::SendFailed)?;
        write_half
            .write_all(b"\n")
            .await
            .map_err(NiriError::SendFailed)?;
        write_half.flush().await.map_err(NiriError::SendFailed)?;

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

        match reply {
            Ok(niri_ipc::Response::Handled) => {}
            Ok(_) => {
                return Err(NiriError::UnexpectedResponse {
                    request: "EventStream",
                })
            }
            Err(message) => return Err(NiriError::Rejected { message }),
        }

        Ok(Self {
            reader,
            socket_path,
        })
    }

    /// Connect with exponential backoff.
    ///
    /// `max_retries` of 0 means a single attempt.
    pub async fn connect_with_retry(max_retries: u32) -> Result<Self, NiriError> {
        let mut attempt = 0;
        let mut delay_ms = INITIAL_RETRY_DELAY_MS;
        let last_error = loop {
            attempt += 1;

            match Self::connect().await {
                Ok(stream) => {
                    if attempt > 1 {
                        info!("Niri event stream connected after {} attempt(s)", attempt);
                    }
                    return Ok(stream);
                }
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
                        "Niri event stream connection failed, retrying..."
                    );

                    sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = (delay_ms * 2).min(MAX_RETRY_DELAY_MS);
                }
            }
        };

        warn!(
            attempts = attempt,
            last_error = %last_error,
            "Failed to connect to niri event stream after all retry attempts"
        );

        Err(NiriError::Unreachable { attempts: attempt })
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Read the next event.
    ///
    /// Returns `ConnectionClosed` on EOF. A line that fails to parse yields
    /// `Decode` but leaves the stream usable, so callers can skip
    /// event kinds newer than this build understands.
    pub async fn next_event(&mut self) -> Result<niri_ipc::Event, NiriError> {
        let mut line = String::new();

        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(NiriError::ReceiveFailed)?;

        if bytes_read == 0 {
            return Err(NiriError::ConnectionClosed);
        }

        serde_json::from_str(&line).map_err(NiriError::Decode)
    }
}
