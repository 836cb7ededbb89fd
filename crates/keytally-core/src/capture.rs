//! Capture bridge
//!
//! Entry point for the input backend. Each raw key transition goes through
//! [`CaptureBridge::on_key`], which samples modifier state, attributes the
//! press to the foreground application, normalizes it and hands it to the
//! event channel. Nothing here blocks or touches the disk.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::channel::{EventSender, PushOutcome};
use crate::event::{now_wall_ms, CaptureEvent, UNKNOWN_APP};
use crate::normalize::{normalize, Modifier, ModifierSet, VirtualKey};

/// Direction of a key transition as reported by the input backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Up,
    Down,
    /// Auto-repeat while held
    Repeat,
}

impl KeyTransition {
    /// Decode a Linux input event value (0 = release, 1 = press, 2 = repeat)
    pub fn from_input_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Up),
            1 => Some(Self::Down),
            2 => Some(Self::Repeat),
            _ => None,
        }
    }
}

/// Lock-free record of which physical modifier keys are held.
///
/// Left and right keys have separate bits, so releasing left Shift while
/// right Shift is still down keeps Shift active.
#[derive(Debug, Default)]
pub struct ModifierState(AtomicU8);

impl ModifierState {
    pub fn new() -> Self {
        Self::default()
    }

    fn bit(key: VirtualKey) -> Option<u8> {
        let index = match key {
            VirtualKey::LCONTROL | VirtualKey::CONTROL => 0,
            VirtualKey::RCONTROL => 1,
            VirtualKey::LSHIFT | VirtualKey::SHIFT => 2,
            VirtualKey::RSHIFT => 3,
            VirtualKey::LMENU | VirtualKey::MENU => 4,
            VirtualKey::RMENU => 5,
            VirtualKey::LWIN => 6,
            VirtualKey::RWIN => 7,
            _ => return None,
        };
        Some(1 << index)
    }

    /// Update state for a modifier key. Non-modifier keys are ignored.
    pub fn apply(&self, key: VirtualKey, transition: KeyTransition) {
        let Some(bit) = Self::bit(key) else {
            return;
        };
        match transition {
            KeyTransition::Down => {
                self.0.fetch_or(bit, Ordering::AcqRel);
            }
            KeyTransition::Up => {
                self.0.fetch_and(!bit, Ordering::AcqRel);
            }
            KeyTransition::Repeat => {}
        }
    }

    /// Currently held modifiers with left/right folded together
    pub fn held(&self) -> ModifierSet {
        let raw = self.0.load(Ordering::Acquire);
        let mut set = ModifierSet::empty();
        for (i, modifier) in Modifier::ALL.into_iter().enumerate() {
            if raw & (0b11 << (i * 2)) != 0 {
                set.insert(modifier);
            }
        }
        set
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }
}

/// Resolves the display name of the application that currently has focus.
///
/// Must be fast: it is called from the capture context on every key-down.
pub trait ForegroundResolver: Send + Sync {
    /// `None` (or an empty name) means the lookup failed
    fn foreground_app(&self) -> Option<String>;
}

impl<F> ForegroundResolver for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn foreground_app(&self) -> Option<String> {
        self()
    }
}

/// Shared cell holding the focused application's name.
///
/// Written by whatever tracks focus (the niri event stream on Linux) and read
/// by the capture bridge.
#[derive(Debug, Default)]
pub struct ForegroundSlot {
    current: RwLock<Option<Arc<str>>>,
}

impl ForegroundSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, app: Option<&str>) {
        let app = app.map(str::trim).filter(|a| !a.is_empty()).map(Arc::from);
        *self.current.write() = app;
    }

    pub fn clear(&self) {
        *self.current.write() = None;
    }

    pub fn get(&self) -> Option<Arc<str>> {
        self.current.read().clone()
    }
}

impl ForegroundResolver for ForegroundSlot {
    fn foreground_app(&self) -> Option<String> {
        self.current.read().as_deref().map(str::to_owned)
    }
}

/// Behavior switches for the capture bridge
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    /// Count a lone modifier key-down as its own combination
    pub count_modifier_keys: bool,
    /// Applications whose key presses are discarded (case-insensitive)
    pub ignore_apps: Vec<String>,
}

/// Counters reported by `keytally status`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStats {
    pub captured: u64,
    pub ignored: u64,
    pub dropped: u64,
}

pub struct CaptureBridge {
    resolver: Arc<dyn ForegroundResolver>,
    sender: EventSender,
    modifiers: ModifierState,
    options: CaptureOptions,
    captured: AtomicU64,
    ignored: AtomicU64,
}

impl CaptureBridge {
    pub fn new(
        resolver: Arc<dyn ForegroundResolver>,
        sender: EventSender,
        options: CaptureOptions,
    ) -> Self {
        Self {
            resolver,
            sender,
            modifiers: ModifierState::new(),
            options,
            captured: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
        }
    }

    /// Handle one key transition.
    ///
    /// Returns the channel outcome when an event was produced, `None` when the
    /// transition only updated modifier state or was filtered out.
    pub fn on_key(&self, key: VirtualKey, transition: KeyTransition) -> Option<PushOutcome> {
        self.modifiers.apply(key, transition);

        if transition != KeyTransition::Down {
            return None;
        }
        if key.is_modifier() && !self.options.count_modifier_keys {
            return None;
        }

        let signature = normalize(key, self.modifiers.held());
        let app_name = self.resolve_app();

        if self.is_ignored(&app_name) {
            self.ignored.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let event = CaptureEvent::new(app_name, signature, now_wall_ms());
        self.captured.fetch_add(1, Ordering::Relaxed);
        Some(self.sender.push(event))
    }

    fn resolve_app(&self) -> String {
        self.resolver
            .foreground_app()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_APP.to_string())
    }

    fn is_ignored(&self, app_name: &str) -> bool {
        self.options
            .ignore_apps
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(app_name))
    }

    /// Forget every held modifier, e.g. after a device disconnects mid-chord
    pub fn reset_modifiers(&self) {
        self.modifiers.reset();
    }

    pub fn held_modifiers(&self) -> ModifierSet {
        self.modifiers.held()
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            captured: self.captured.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            dropped: self.sender.dropped(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::event_channel;

    fn key(c: char) -> VirtualKey {
        VirtualKey::from_char(c).unwrap()
    }

    fn bridge_with(
        app: Option<&str>,
        options: CaptureOptions,
    ) -> (CaptureBridge, Arc<ForegroundSlot>, crate::channel::EventReceiver) {
        let slot = Arc::new(ForegroundSlot::new());
        slot.set(app);
        let (tx, rx) = event_channel(64);
        let bridge = CaptureBridge::new(slot.clone(), tx, options);
        (bridge, slot, rx)
    }

    fn signatures(rx: &crate::channel::EventReceiver) -> Vec<String> {
        std::iter::from_fn(|| rx.try_pop()).map(|e| e.signature).collect()
    }

    #[test]
    fn test_only_key_down_produces_events() {
        let (bridge, _slot, rx) = bridge_with(Some("notepad"), CaptureOptions::default());

        assert!(bridge.on_key(key('a'), KeyTransition::Down).is_some());
        assert!(bridge.on_key(key('a'), KeyTransition::Repeat).is_none());
        assert!(bridge.on_key(key('a'), KeyTransition::Up).is_none());

        let events: Vec<_> = std::iter::from_fn(|| rx.try_pop()).collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].app_name, "notepad");
        assert_eq!(events[0].signature, "A");
        assert!(events[0].timestamp_ms > 0);
    }

    #[test]
    fn test_modifier_state_applies_prefixes() {
        let (bridge, _slot, rx) = bridge_with(Some("notepad"), CaptureOptions::default());

        bridge.on_key(VirtualKey::LSHIFT, KeyTransition::Down);
        bridge.on_key(VirtualKey::LCONTROL, KeyTransition::Down);
        bridge.on_key(key('s'), KeyTransition::Down);
        bridge.on_key(key('s'), KeyTransition::Up);
        bridge.on_key(VirtualKey::LSHIFT, KeyTransition::Up);
        bridge.on_key(key('s'), KeyTransition::Down);
        bridge.on_key(VirtualKey::LCONTROL, KeyTransition::Up);
        bridge.on_key(key('s'), KeyTransition::Down);

        assert_eq!(signatures(&rx), vec!["Ctrl+Shift+S", "Ctrl+S", "S"]);
    }

    #[test]
    fn test_left_and_right_modifiers_tracked_independently() {
        let state = ModifierState::new();
        state.apply(VirtualKey::LSHIFT, KeyTransition::Down);
        state.apply(VirtualKey::RSHIFT, KeyTransition::Down);
        state.apply(VirtualKey::LSHIFT, KeyTransition::Up);
        assert!(state.held().contains(Modifier::Shift));

        state.apply(VirtualKey::RSHIFT, KeyTransition::Up);
        assert!(state.held().is_empty());
    }

    #[test]
    fn test_modifier_keys_not_counted_by_default() {
        let (bridge, _slot, rx) = bridge_with(Some("app"), CaptureOptions::default());
        assert!(bridge.on_key(VirtualKey::LCONTROL, KeyTransition::Down).is_none());
        assert!(rx.is_empty());
        assert_eq!(bridge.held_modifiers(), ModifierSet::empty().with(Modifier::Ctrl));
    }

    #[test]
    fn test_modifier_keys_counted_when_enabled() {
        let options = CaptureOptions {
            count_modifier_keys: true,
            ..Default::default()
        };
        let (bridge, _slot, rx) = bridge_with(Some("app"), options);

        bridge.on_key(VirtualKey::LCONTROL, KeyTransition::Down);
        bridge.on_key(VirtualKey::LSHIFT, KeyTransition::Down);

        assert_eq!(signatures(&rx), vec!["Ctrl", "Ctrl+Shift"]);
    }

    #[test]
    fn test_unresolved_app_becomes_unknown() {
        let (bridge, slot, rx) = bridge_with(None, CaptureOptions::default());
        bridge.on_key(key('x'), KeyTransition::Down);

        slot.set(Some("   "));
        bridge.on_key(key('y'), KeyTransition::Down);

        let apps: Vec<_> = std::iter::from_fn(|| rx.try_pop()).map(|e| e.app_name).collect();
        assert_eq!(apps, vec![UNKNOWN_APP, UNKNOWN_APP]);
    }

    #[test]
    fn test_focus_change_is_picked_up() {
        let (bridge, slot, rx) = bridge_with(Some("firefox"), CaptureOptions::default());
        bridge.on_key(key('a'), KeyTransition::Down);
        slot.set(Some("Alacritty"));
        bridge.on_key(key('b'), KeyTransition::Down);

        let apps: Vec<_> = std::iter::from_fn(|| rx.try_pop()).map(|e| e.app_name).collect();
        assert_eq!(apps, vec!["firefox", "Alacritty"]);
    }

    #[test]
    fn test_ignored_apps_are_filtered() {
        let options = CaptureOptions {
            ignore_apps: vec!["org.keepassxc.KeePassXC".to_string()],
            ..Default::default()
        };
        let (bridge, slot, rx) = bridge_with(Some("org.keepassxc.keepassxc"), options);

        assert!(bridge.on_key(key('p'), KeyTransition::Down).is_none());
        slot.set(Some("firefox"));
        assert!(bridge.on_key(key('p'), KeyTransition::Down).is_some());

        assert_eq!(rx.len(), 1);
        let stats = bridge.stats();
        assert_eq!(stats.captured, 1);
        assert_eq!(stats.ignored, 1);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn test_closure_resolver() {
        let (tx, rx) = event_channel(4);
        let resolver: Arc<dyn ForegroundResolver> = Arc::new(|| Some("code".to_string()));
        let bridge = CaptureBridge::new(resolver, tx, CaptureOptions::default());

        bridge.on_key(VirtualKey::F1, KeyTransition::Down);
        let event = rx.try_pop().unwrap();
        assert_eq!(event.app_name, "code");
        assert_eq!(event.signature, "F1");
    }

    #[test]
    fn test_reset_modifiers() {
        let (bridge, _slot, rx) = bridge_with(Some("app"), CaptureOptions::default());
        bridge.on_key(VirtualKey::RMENU, KeyTransition::Down);
        bridge.reset_modifiers();
        bridge.on_key(VirtualKey::TAB, KeyTransition::Down);
        assert_eq!(signatures(&rx), vec!["Tab"]);
    }

    #[test]
    fn test_transition_from_input_value() {
        assert_eq!(KeyTransition::from_input_value(0), Some(KeyTransition::Up));
        assert_eq!(KeyTransition::from_input_value(1), Some(KeyTransition::Down));
        assert_eq!(KeyTransition::from_input_value(2), Some(KeyTransition::Repeat));
        assert_eq!(KeyTransition::from_input_value(7), None);
    }
}
