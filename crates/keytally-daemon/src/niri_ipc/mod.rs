//! Niri IPC client for focus tracking
//!
//! Keystrokes are attributed to the application that owns the focused window.
//! On niri that is the window's Wayland `app_id`, which we learn from the
//! compositor's IPC socket.
//!
//! ## Architecture
//!
//! - `NiriClient`: request/response connection used to seed the window list
//! - `NiriEventStream`: dedicated connection that receives compositor events
//! - `FocusTracker`: folds window and focus events into "which app is focused"
//! - `spawn_focus_tracker`: task that keeps a `ForegroundSlot` up to date
//!
//! ## Protocol
//!
//! Niri exposes a Unix socket at `$NIRI_SOCKET`. Clients send JSON-formatted
//! `Request` messages (one per line) and receive JSON `Reply` responses.
//! After `Request::EventStream` the connection only carries events.

mod client;
mod error;
mod events;
mod focus;
mod types;

pub use focus::spawn_focus_tracker;
