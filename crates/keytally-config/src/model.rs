//! Configuration data model

use std::path::PathBuf;

pub use keytally_core::DEFAULT_HISTORY_CAPACITY;

/// Default cap on captured-but-unconsumed events
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

/// Root configuration structure
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: GlobalConfig,
    pub capture: CaptureConfig,
    pub devices: Vec<DeviceConfig>,
}

/// Global settings
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub log_level: LogLevel,
    /// SQLite database holding the durable per-(app, combination) counts
    pub database_path: PathBuf,
    /// Where `keytally export` writes its report by default
    pub export_path: PathBuf,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            database_path: PathBuf::from(
                shellexpand::tilde("~/.local/share/keytally/keypress_stats.db").into_owned(),
            ),
            export_path: PathBuf::from(shellexpand::tilde("~/keytally_stats.txt").into_owned()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Capture pipeline settings
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Capacity of the in-memory recent-activity history
    pub history_capacity: usize,
    /// Safety cap on the capture -> consumer channel; the oldest event is
    /// dropped once it is reached
    pub channel_capacity: usize,
    /// Count a lone modifier press (e.g. just `Shift`) as its own combination
    pub count_modifier_keys: bool,
    /// Applications whose keystrokes are never counted (matched case-insensitively)
    pub ignore_apps: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            count_modifier_keys: false,
            ignore_apps: Vec::new(),
        }
    }
}

/// A keyboard to watch, matched by its evdev name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub name: String,
}
