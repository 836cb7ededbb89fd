//! KDL configuration parser

use std::path::Path;

use crate::error::ConfigError;
use crate::model::*;

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse the configuration file if it exists, otherwise fall back to defaults
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::info!(
            "No configuration at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }
    parse_config(path)
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl uses an older miette version, so we need to extract offset/len manually
        let offset = e.span.offset();
        let len = e.span.len();
        let span = miette::SourceSpan::from((offset, len));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "global" => {
                config.global = parse_global(node)?;
            }
            "capture" => {
                config.capture = parse_capture(node)?;
            }
            "device" => {
                config.devices.push(parse_device(node)?);
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

fn first_string<'a>(node: &'a kdl::KdlNode) -> Option<&'a str> {
    node.entries().first().and_then(|e| e.value().as_string())
}

fn parse_global(node: &kdl::KdlNode) -> Result<GlobalConfig, ConfigError> {
    let mut global = GlobalConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "log-level" => {
                    if let Some(val) = first_string(child) {
                        global.log_level = val
                            .parse()
                            .map_err(|e| ConfigError::Invalid { message: e })?;
                    }
                }
                "database" => {
                    if let Some(val) = first_string(child) {
                        global.database_path = shellexpand::tilde(val).into_owned().into();
                    }
                }
                "export-path" => {
                    if let Some(val) = first_string(child) {
                        global.export_path = shellexpand::tilde(val).into_owned().into();
                    }
                }
                name => {
                    tracing::warn!("Unknown global config option: {}", name);
                }
            }
        }
    }

    Ok(global)
}

fn parse_capture(node: &kdl::KdlNode) -> Result<CaptureConfig, ConfigError> {
    let mut capture = CaptureConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "history-capacity" => {
                    capture.history_capacity = parse_capacity(child, "history-capacity")?;
                }
                "channel-capacity" => {
                    capture.channel_capacity = parse_capacity(child, "channel-capacity")?;
                }
                "count-modifier-keys" => {
                    let value = child
                        .entries()
                        .first()
                        .and_then(|e| e.value().as_bool())
                        .ok_or_else(|| ConfigError::Invalid {
                            message: "count-modifier-keys expects true or false".to_string(),
                        })?;
                    capture.count_modifier_keys = value;
                }
                "ignore-app" => {
                    for entry in child.entries() {
                        if let Some(app) = entry.value().as_string() {
                            let app = app.trim();
                            if !app.is_empty() {
                                capture.ignore_apps.push(app.to_string());
                            }
                        }
                    }
                }
                name => {
                    tracing::warn!("Unknown capture config option: {}", name);
                }
            }
        }
    }

    Ok(capture)
}

fn parse_capacity(node: &kdl::KdlNode, option: &str) -> Result<usize, ConfigError> {
    let value = node
        .entries()
        .first()
        .and_then(|e| e.value().as_i64())
        .ok_or_else(|| ConfigError::Invalid {
            message: format!("{} expects an integer", option),
        })?;

    if value <= 0 {
        return Err(ConfigError::Invalid {
            message: format!("{} must be positive, got {}", option, value),
        });
    }

    usize::try_from(value).map_err(|_| ConfigError::Invalid {
        message: format!("{} is too large: {}", option, value),
    })
}

fn parse_device(node: &kdl::KdlNode) -> Result<DeviceConfig, ConfigError> {
    let name = first_string(node)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingField {
            field: "device name (e.g., `device \"My Keyboard\"`)".to_string(),
        })?;

    if node.children().is_some() {
        tracing::warn!("Device '{}' has child nodes, which are ignored", name);
    }

    Ok(DeviceConfig {
        name: name.to_string(),
    })
}
