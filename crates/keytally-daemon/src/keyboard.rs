//! evdev keyboard hook
//!
//! Reads key events from every watched keyboard and forwards them to the
//! [`CaptureBridge`]. Each device gets its own tokio task; the task holds an
//! `Arc` of the bridge and does nothing but decode the event and call
//! [`CaptureBridge::on_key`]. Devices are only read, never grabbed, so typing
//! keeps working normally while keytally counts.

use std::sync::Arc;

use evdev::{Device, InputEventKind, Key};
use keytally_core::protocol::DeviceStatus;
use keytally_core::{CaptureBridge, KeyTransition, VirtualKey};
use tokio::task::JoinHandle;

use crate::device::DeviceInfo;
use crate::error::StartupError;

/// Keys without a virtual-key equivalent are offset into this range so they
/// still get a stable `VK_<code>` name.
const UNMAPPED_BASE: u32 = 0x1_0000;

/// Translate a Linux key code into the virtual-key space
pub fn key_to_vk(key: Key) -> VirtualKey {
    let vk = match key {
        Key::KEY_A => 0x41,
        Key::KEY_B => 0x42,
        Key::KEY_C => 0x43,
        Key::KEY_D => 0x44,
        Key::KEY_E => 0x45,
        Key::KEY_F => 0x46,
        Key::KEY_G => 0x47,
        Key::KEY_H => 0x48,
        Key::KEY_I => 0x49,
        Key::KEY_J => 0x4A,
        Key::KEY_K => 0x4B,
        Key::KEY_L => 0x4C,
        Key::KEY_M => 0x4D,
        Key::KEY_N => 0x4E,
        Key::KEY_O => 0x4F,
        Key::KEY_P => 0x50,
        Key::KEY_Q => 0x51,
        Key::KEY_R => 0x52,
        Key::KEY_S => 0x53,
        Key::KEY_T => 0x54,
        Key::KEY_U => 0x55,
        Key::KEY_V => 0x56,
        Key::KEY_W => 0x57,
        Key::KEY_X => 0x58,
        Key::KEY_Y => 0x59,
        Key::KEY_Z => 0x5A,

        Key::KEY_0 => 0x30,
        Key::KEY_1 => 0x31,
        Key::KEY_2 => 0x32,
        Key::KEY_3 => 0x33,
        Key::KEY_4 => 0x34,
        Key::KEY_5 => 0x35,
        Key::KEY_6 => 0x36,
        Key::KEY_7 => 0x37,
        Key::KEY_8 => 0x38,
        Key::KEY_9 => 0x39,

        Key::KEY_BACKSPACE => VirtualKey::BACK.0,
        Key::KEY_TAB => VirtualKey::TAB.0,
        Key::KEY_ENTER | Key::KEY_KPENTER => VirtualKey::RETURN.0,
        Key::KEY_PAUSE => VirtualKey::PAUSE.0,
        Key::KEY_CAPSLOCK => VirtualKey::CAPITAL.0,
        Key::KEY_ESC => VirtualKey::ESCAPE.0,
        Key::KEY_SPACE => VirtualKey::SPACE.0,
        Key::KEY_PAGEUP => VirtualKey::PRIOR.0,
        Key::KEY_PAGEDOWN => VirtualKey::NEXT.0,
        Key::KEY_END => VirtualKey::END.0,
        Key::KEY_HOME => VirtualKey::HOME.0,
        Key::KEY_LEFT => VirtualKey::LEFT.0,
        Key::KEY_UP => VirtualKey::UP.0,
        Key::KEY_RIGHT => VirtualKey::RIGHT.0,
        Key::KEY_DOWN => VirtualKey::DOWN.0,
        Key::KEY_SYSRQ => VirtualKey::SNAPSHOT.0,
        Key::KEY_INSERT => VirtualKey::INSERT.0,
        Key::KEY_DELETE => VirtualKey::DELETE.0,
        Key::KEY_COMPOSE => VirtualKey::APPS.0,

        Key::KEY_LEFTSHIFT => VirtualKey::LSHIFT.0,
        Key::KEY_RIGHTSHIFT => VirtualKey::RSHIFT.0,
        Key::KEY_LEFTCTRL => VirtualKey::LCONTROL.0,
        Key::KEY_RIGHTCTRL => VirtualKey::RCONTROL.0,
        Key::KEY_LEFTALT => VirtualKey::LMENU.0,
        Key::KEY_RIGHTALT => VirtualKey::RMENU.0,
        Key::KEY_LEFTMETA => VirtualKey::LWIN.0,
        Key::KEY_RIGHTMETA => VirtualKey::RWIN.0,

        Key::KEY_KP0 => VirtualKey::NUMPAD0.0,
        Key::KEY_KP1 => VirtualKey::NUMPAD0.0 + 1,
        Key::KEY_KP2 => VirtualKey::NUMPAD0.0 + 2,
        Key::KEY_KP3 => VirtualKey::NUMPAD0.0 + 3,
        Key::KEY_KP4 => VirtualKey::NUMPAD0.0 + 4,
        Key::KEY_KP5 => VirtualKey::NUMPAD0.0 + 5,
        Key::KEY_KP6 => VirtualKey::NUMPAD0.0 + 6,
        Key::KEY_KP7 => VirtualKey::NUMPAD0.0 + 7,
        Key::KEY_KP8 => VirtualKey::NUMPAD0.0 + 8,
        Key::KEY_KP9 => VirtualKey::NUMPAD0.0 + 9,
        Key::KEY_KPASTERISK => VirtualKey::MULTIPLY.0,
        Key::KEY_KPPLUS => VirtualKey::ADD.0,
        Key::KEY_KPMINUS => VirtualKey::SUBTRACT.0,
        Key::KEY_KPDOT => VirtualKey::DECIMAL.0,
        Key::KEY_KPSLASH => VirtualKey::DIVIDE.0,
        Key::KEY_NUMLOCK => VirtualKey::NUMLOCK.0,
        Key::KEY_SCROLLLOCK => VirtualKey::SCROLL.0,

        Key::KEY_F1 => VirtualKey::F1.0,
        Key::KEY_F2 => VirtualKey::F1.0 + 1,
        Key::KEY_F3 => VirtualKey::F1.0 + 2,
        Key::KEY_F4 => VirtualKey::F1.0 + 3,
        Key::KEY_F5 => VirtualKey::F1.0 + 4,
        Key::KEY_F6 => VirtualKey::F1.0 + 5,
        Key::KEY_F7 => VirtualKey::F1.0 + 6,
        Key::KEY_F8 => VirtualKey::F1.0 + 7,
        Key::KEY_F9 => VirtualKey::F1.0 + 8,
        Key::KEY_F10 => VirtualKey::F1.0 + 9,
        Key::KEY_F11 => VirtualKey::F1.0 + 10,
        Key::KEY_F12 => VirtualKey::F1.0 + 11,
        Key::KEY_F13 => VirtualKey::F1.0 + 12,
        Key::KEY_F14 => VirtualKey::F1.0 + 13,
        Key::KEY_F15 => VirtualKey::F1.0 + 14,
        Key::KEY_F16 => VirtualKey::F1.0 + 15,
        Key::KEY_F17 => VirtualKey::F1.0 + 16,
        Key::KEY_F18 => VirtualKey::F1.0 + 17,
        Key::KEY_F19 => VirtualKey::F1.0 + 18,
        Key::KEY_F20 => VirtualKey::F1.0 + 19,
        Key::KEY_F21 => VirtualKey::F1.0 + 20,
        Key::KEY_F22 => VirtualKey::F1.0 + 21,
        Key::KEY_F23 => VirtualKey::F1.0 + 22,
        Key::KEY_F24 => VirtualKey::F1.0 + 23,

        Key::KEY_SEMICOLON => VirtualKey::OEM_1.0,
        Key::KEY_EQUAL => VirtualKey::OEM_PLUS.0,
        Key::KEY_COMMA => VirtualKey::OEM_COMMA.0,
        Key::KEY_MINUS => VirtualKey::OEM_MINUS.0,
        Key::KEY_DOT => VirtualKey::OEM_PERIOD.0,
        Key::KEY_SLASH => VirtualKey::OEM_2.0,
        Key::KEY_GRAVE => VirtualKey::OEM_3.0,
        Key::KEY_LEFTBRACE => VirtualKey::OEM_4.0,
        Key::KEY_BACKSLASH => VirtualKey::OEM_5.0,
        Key::KEY_RIGHTBRACE => VirtualKey::OEM_6.0,
        Key::KEY_APOSTROPHE => VirtualKey::OEM_7.0,
        Key::KEY_102ND => VirtualKey::OEM_102.0,

        Key::KEY_MUTE => VirtualKey::VOLUME_MUTE.0,
        Key::KEY_VOLUMEDOWN => VirtualKey::VOLUME_DOWN.0,
        Key::KEY_VOLUMEUP => VirtualKey::VOLUME_UP.0,
        Key::KEY_NEXTSONG => VirtualKey::MEDIA_NEXT_TRACK.0,
        Key::KEY_PREVIOUSSONG => VirtualKey::MEDIA_PREV_TRACK.0,
        Key::KEY_STOPCD => VirtualKey::MEDIA_STOP.0,
        Key::KEY_PLAYPAUSE => VirtualKey::MEDIA_PLAY_PAUSE.0,

        other => UNMAPPED_BASE | u32::from(other.code()),
    };
    VirtualKey(vk)
}

struct WatchedDevice {
    info: DeviceInfo,
    task: JoinHandle<()>,
}

/// The installed hook: one reader task per keyboard.
///
/// Dropping the hook without calling [`unregister`](Self::unregister) leaves
/// the tasks running until the runtime shuts down.
pub struct KeyboardHook {
    devices: Vec<WatchedDevice>,
}

impl KeyboardHook {
    /// Start reading from every device. Fails if any device cannot be turned
    /// into an event stream; tasks already started are aborted in that case.
    pub fn install(
        keyboards: Vec<(DeviceInfo, Device)>,
        bridge: Arc<CaptureBridge>,
    ) -> Result<Self, StartupError> {
        let mut hook = Self {
            devices: Vec::with_capacity(keyboards.len()),
        };

        for (info, device) in keyboards {
            let stream = match device.into_event_stream() {
                Ok(stream) => stream,
                Err(source) => {
                    hook.abort_all();
                    return Err(StartupError::Hook {
                        name: info.name,
                        path: info.path,
                        source,
                    });
                }
            };

            let task = tokio::spawn(read_device(info.clone(), stream, Arc::clone(&bridge)));
            hook.devices.push(WatchedDevice { info, task });
        }

        tracing::info!("Keyboard hook installed on {} device(s)", hook.devices.len());
        Ok(hook)
    }

    pub fn devices(&self) -> Vec<DeviceStatus> {
        self.devices
            .iter()
            .map(|d| DeviceStatus {
                name: d.info.name.clone(),
                path: d.info.path.clone(),
            })
            .collect()
    }

    fn abort_all(&mut self) {
        for device in &self.devices {
            device.task.abort();
        }
    }

    /// Stop every reader task and wait for them to finish.
    ///
    /// After this returns no further events reach the bridge.
    pub async fn unregister(mut self) {
        self.abort_all();
        for device in self.devices.drain(..) {
            // A cancelled task is the expected outcome here
            let _ = device.task.await;
            tracing::debug!("Stopped reading '{}'", device.info.name);
        }
        tracing::info!("Keyboard hook unregistered");
    }
}

async fn read_device(info: DeviceInfo, mut stream: evdev::EventStream, bridge: Arc<CaptureBridge>) {
    loop {
        let event = match stream.next_event().await {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    "Lost keyboard '{}' at {}: {}",
                    info.name,
                    info.path.display(),
                    e
                );
                bridge.reset_modifiers();
                return;
            }
        };

        if let InputEventKind::Key(key) = event.kind() {
            if let Some(transition) = KeyTransition::from_input_value(event.value()) {
                bridge.on_key(key_to_vk(key), transition);
            }
        }
    }
}
