//! Focused-application tracking
//!
//! Folds niri's window and focus events into the name of the focused
//! application and publishes it into a [`ForegroundSlot`] for the capture
//! bridge to read.

use std::collections::HashMap;
use std::sync::Arc;

use keytally_core::ForegroundSlot;
use tokio::task::JoinHandle;

use super::client::NiriClient;
use super::error::NiriError;
use super::events::{NiriEventStream, DEFAULT_MAX_RETRIES};
use super::types::Window;

/// Window list plus the id of the focused one
#[derive(Debug, Default)]
pub struct FocusTracker {
    windows: HashMap<u64, Window>,
    focused: Option<u64>,
}

impl FocusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the known windows wholesale
    pub fn reset(&mut self, windows: impl IntoIterator<Item = Window>) {
        self.windows = windows.into_iter().map(|w| (w.id, w)).collect();
        self.focused = self.windows.values().find(|w| w.is_focused).map(|w| w.id);
    }

    pub fn set_focused(&mut self, id: Option<u64>) {
        self.focused = id;
    }

    /// Apply one compositor event. Returns `true` if the focused application
    /// may have changed.
    pub fn apply(&mut self, event: &niri_ipc::Event) -> bool {
        let before = self.focused_app().map(str::to_owned);

        match event {
            niri_ipc::Event::WindowsChanged { windows } => {
                self.reset(windows.iter().map(Window::from));
            }
            niri_ipc::Event::WindowOpenedOrChanged { window } => {
                let window = Window::from(window);
                if window.is_focused {
                    self.focused = Some(window.id);
                }
                self.windows.insert(window.id, window);
            }
            niri_ipc::Event::WindowClosed { id } => {
                self.windows.remove(id);
                if self.focused == Some(*id) {
                    self.focused = None;
                }
            }
            niri_ipc::Event::WindowFocusChanged { id } => {
                self.focused = *id;
            }
            _ => return false,
        }

        self.focused_app() != before.as_deref()
    }

    pub fn focused_window(&self) -> Option<&Window> {
        self.focused.and_then(|id| self.windows.get(&id))
    }

    /// App id of the focused window, if any window has focus and set one
    pub fn focused_app(&self) -> Option<&str> {
        self.focused_window().and_then(Window::app_name)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }
}

/// Keep `slot` pointed at the focused application for as long as niri runs.
///
/// Reconnects whenever the event stream drops. If niri cannot be reached at
/// all, the slot is cleared and the task ends; captures then fall back to the
/// unknown application.
pub fn spawn_focus_tracker(slot: Arc<ForegroundSlot>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match track_until_disconnect(&slot).await {
                Ok(()) => {
                    tracing::info!("Niri event stream closed, reconnecting");
                    slot.clear();
                }
                Err(NiriError::SocketNotSet) => {
                    tracing::warn!(
                        "NIRI_SOCKET not set, key presses will be attributed to the unknown application"
                    );
                    slot.clear();
                    return;
                }
                Err(e) => {
                    tracing::warn!("Focus tracking disabled: {}", e);
                    slot.clear();
                    return;
                }
            }
        }
    })
}

async fn track_until_disconnect(slot: &ForegroundSlot) -> Result<(), NiriError> {
    let mut stream = NiriEventStream::connect_with_retry(DEFAULT_MAX_RETRIES).await?;
    tracing::info!("Following niri events on {}", stream.socket_path().display());
    let mut tracker = FocusTracker::new();

    // niri replays the window list on subscription, but seeding keeps the slot
    // correct even before the first event arrives
    match seed(&mut tracker).await {
        Ok(()) => publish(slot, &tracker),
        Err(e) => tracing::debug!("Could not seed window list: {}", e),
    }

    loop {
        match stream.next_event().await {
            Ok(event) => {
                if tracker.apply(&event) {
                    publish(slot, &tracker);
                }
            }
            Err(NiriError::Decode(e)) => {
                tracing::debug!("Skipping unrecognized niri event: {}", e);
            }
            Err(NiriError::ConnectionClosed) => return Ok(()),
            Err(e) => {
                tracing::debug!("Niri event stream error: {}", e);
                return Ok(());
            }
        }
    }
}

async fn seed(tracker: &mut FocusTracker) -> Result<(), NiriError> {
    let mut client = NiriClient::connect_with_retry(1).await?;
    tracker.reset(client.get_windows().await?);
    let focused = client.get_focused_window().await?;
    tracker.set_focused(focused.map(|w| w.id));
    Ok(())
}

fn publish(slot: &ForegroundSlot, tracker: &FocusTracker) {
    let app = tracker.focused_app();
    tracing::debug!(
        windows = tracker.window_count(),
        title = tracker.focused_window().map(|w| w.title.as_str()).unwrap_or(""),
        "Focused application: {}",
        app.unwrap_or("<none>")
    );
    slot.set(app);
}
