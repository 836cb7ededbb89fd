//! Configuration parsing for keytally
//!
//! This crate handles parsing the KDL configuration file that controls the
//! keytally daemon: where statistics are stored, how much recent activity is
//! kept in memory, and which keyboards are watched.

mod error;
mod model;
mod parser;

pub use error::ConfigError;
pub use model::*;
pub use parser::{load_config, parse_config, parse_config_str};
