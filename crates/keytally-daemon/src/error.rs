//! Fatal startup errors

use std::path::PathBuf;

use keytally_core::StoreError;
use thiserror::Error;

/// Anything that stops the daemon from starting.
///
/// Once startup succeeds, nothing else is fatal: query and write failures are
/// logged and the pipeline keeps running.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to open statistics database: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to enumerate input devices in /dev/input: {0}")]
    Enumerate(#[source] std::io::Error),

    #[error("No keyboard found{}", describe_wanted(.wanted))]
    NoKeyboards { wanted: Vec<String> },

    #[error("Failed to install keyboard hook on '{name}' ({path}): {source}")]
    Hook {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start consumer thread: {0}")]
    Consumer(#[source] std::io::Error),
}

fn describe_wanted(wanted: &[String]) -> String {
    if wanted.is_empty() {
        " (is the user in the 'input' group?)".to_string()
    } else {
        format!(" matching {}", wanted.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_keyboards_message() {
        let err = StartupError::NoKeyboards { wanted: vec![] };
        assert!(err.to_string().contains("input' group"));

        let err = StartupError::NoKeyboards {
            wanted: vec!["Keychron K3 Pro".to_string(), "HHKB".to_string()],
        };
        assert_eq!(err.to_string(), "No keyboard found matching Keychron K3 Pro, HHKB");
    }
}
