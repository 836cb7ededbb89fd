//! Keyboard enumeration

use std::path::PathBuf;

use evdev::Device;
use keytally_config::DeviceConfig;

use crate::error::StartupError;

/// Information about an input device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub path: PathBuf,
    pub name: String,
    pub vendor: u16,
    pub product: u16,
}

impl DeviceInfo {
    /// Get vendor:product string (e.g., "3434:0361")
    pub fn vendor_product(&self) -> String {
        format!("{:04x}:{:04x}", self.vendor, self.product)
    }
}

/// Check if a device is a keyboard
pub fn is_keyboard(device: &Device) -> bool {
    device.supported_events().contains(evdev::EventType::KEY)
        && device
            .supported_keys()
            .map(|keys| keys.contains(evdev::Key::KEY_A))
            .unwrap_or(false)
}

/// Whether a device with this name should be watched.
///
/// An empty list watches every keyboard.
pub fn is_wanted(name: &str, wanted: &[DeviceConfig]) -> bool {
    wanted.is_empty() || wanted.iter().any(|d| d.name == name)
}

/// Open every keyboard under `/dev/input` that the configuration selects
pub fn open_keyboards(wanted: &[DeviceConfig]) -> Result<Vec<(DeviceInfo, Device)>, StartupError> {
    let mut keyboards = Vec::new();

    let mut paths: Vec<PathBuf> = std::fs::read_dir("/dev/input")
        .map_err(StartupError::Enumerate)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("event"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    for path in paths {
        let device = match Device::open(&path) {
            Ok(device) => device,
            Err(e) => {
                tracing::debug!("Could not open {}: {}", path.display(), e);
                continue;
            }
        };

        if !is_keyboard(&device) {
            continue;
        }

        let name = device.name().unwrap_or("Unknown").to_string();
        if !is_wanted(&name, wanted) {
            tracing::debug!("Keyboard '{}' is not configured, skipping", name);
            continue;
        }

        let id = device.input_id();
        let info = DeviceInfo {
            path,
            name,
            vendor: id.vendor(),
            product: id.product(),
        };
        tracing::info!(
            "Watching keyboard '{}' [{}] at {}",
            info.name,
            info.vendor_product(),
            info.path.display()
        );
        keyboards.push((info, device));
    }

    if keyboards.is_empty() {
        return Err(StartupError::NoKeyboards {
            wanted: wanted.iter().map(|d| d.name.clone()).collect(),
        });
    }

    Ok(keyboards)
}
