//! Internal view of niri windows
//!
//! Only the fields focus tracking needs, decoupled from the `niri-ipc` crate
//! so upstream additions don't ripple through the daemon.

/// A window known to the compositor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Window {
    /// Unique window identifier assigned by niri, stable for the window's lifetime
    pub id: u64,

    /// The application identifier (e.g., "firefox", "Alacritty"). Empty when
    /// the client never set one.
    pub app_id: String,

    pub title: String,

    pub is_focused: bool,
}

impl Window {
    /// Name keystrokes in this window are attributed to
    pub fn app_name(&self) -> Option<&str> {
        let app_id = self.app_id.trim();
        (!app_id.is_empty()).then_some(app_id)
    }
}

impl From<niri_ipc::Window> for Window {
    fn from(window: niri_ipc::Window) -> Self {
        Self {
            id: window.id,
            app_id: window.app_id.unwrap_or_default(),
            title: window.title.unwrap_or_default(),
            is_focused: window.is_focused,
        }
    }
}

impl From<&niri_ipc::Window> for Window {
    fn from(window: &niri_ipc::Window) -> Self {
        Self {
            id: window.id,
            app_id: window.app_id.clone().unwrap_or_default(),
            title: window.title.clone().unwrap_or_default(),
            is_focused: window.is_focused,
        }
    }
}
