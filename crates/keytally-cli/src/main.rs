//! keytally CLI
//!
//! Query and maintenance tool for the keytally daemon and its database.

mod client;
mod offline;
mod output;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use keytally_core::protocol::{default_socket_path, IpcRequest, IpcResponse};
use keytally_core::StatsStore;
use miette::IntoDiagnostic;

#[derive(Parser, Debug)]
#[command(name = "keytally")]
#[command(about = "Per-application keystroke statistics for niri")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/keytally/config.kdl")]
    config: String,

    /// Read the statistics database directly instead of asking the daemon
    #[arg(short, long, global = true)]
    database: Option<String>,

    /// Daemon socket (defaults to $XDG_RUNTIME_DIR/keytally.sock)
    #[arg(short, long, global = true)]
    socket: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration file
    Validate,

    /// List available input devices
    Devices,

    /// Ranked key combinations for one application
    Stats {
        app: String,
        #[arg(short, long, default_value_t = 20, conflicts_with = "all")]
        limit: usize,
        /// List every combination
        #[arg(short, long)]
        all: bool,
    },

    /// Applications with recorded key presses
    Apps,

    /// Key combinations ranked across all applications
    Top {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Total recorded key presses
    Total {
        /// Only count presses in this application
        #[arg(short, long)]
        app: Option<String>,
    },

    /// Most recent key presses, newest first
    Recent {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },

    /// Busiest applications and combinations in the recent history
    Activity {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Delete all recorded statistics
    Clear,

    /// Write the full report to a text file
    Export {
        /// Output path (overrides config setting)
        #[arg(short, long, value_parser = absolute_path)]
        output: Option<PathBuf>,
    },

    /// Show current daemon status
    Status,
}

impl Commands {
    /// Requests that answer this command, in display order.
    ///
    /// Empty for commands that do not talk to the daemon.
    fn requests(&self) -> Vec<IpcRequest> {
        match self {
            Commands::Validate | Commands::Devices => Vec::new(),
            Commands::Stats { app, limit, all } => vec![IpcRequest::AppStatistics {
                app: app.clone(),
                limit: (!*all).then_some(*limit),
            }],
            Commands::Apps => vec![IpcRequest::AllApps],
            Commands::Top { limit } => vec![IpcRequest::TopKeyPresses { limit: *limit }],
            Commands::Total { app } => vec![IpcRequest::TotalPresses { app: app.clone() }],
            Commands::Recent { count } => vec![IpcRequest::Recent { count: *count }],
            Commands::Activity { limit } => vec![
                IpcRequest::Summary,
                IpcRequest::TopApps { limit: *limit },
                IpcRequest::TopSignatures {
                    app: None,
                    limit: *limit,
                },
            ],
            Commands::Clear => vec![IpcRequest::ClearStatistics],
            Commands::Export { output } => vec![IpcRequest::Export {
                path: output.clone(),
            }],
            Commands::Status => vec![IpcRequest::Status],
        }
    }
}

/// The daemon resolves paths against its own working directory, so relative
/// ones are anchored to ours before they are sent
fn absolute_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(shellexpand::tilde(value).into_owned());
    if path.is_absolute() {
        return Ok(path);
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|e| format!("cannot resolve relative path: {}", e))
}

/// Section titles printed before each response of a multi-request command
fn headings(command: &Commands) -> &'static [&'static str] {
    match command {
        Commands::Activity { .. } => &["", "\nTop applications:", "\nTop combinations:"],
        _ => &[],
    }
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config_path: PathBuf = shellexpand::tilde(&cli.config).into_owned().into();

    match cli.command {
        Commands::Validate => cmd_validate(&config_path),
        Commands::Devices => cmd_devices(),
        ref command => {
            let backend = Backend::select(&cli, &config_path)?;
            cmd_query(&backend, command)
        }
    }
}

fn cmd_validate(config_path: &Path) -> miette::Result<()> {
    println!("Validating configuration: {}", config_path.display());

    let config = keytally_config::parse_config(config_path)?;
    println!("Configuration is valid!");
    println!("  Database: {}", config.global.database_path.display());
    println!("  Export path: {}", config.global.export_path.display());
    println!("  History capacity: {}", config.capture.history_capacity);
    println!("  Channel capacity: {}", config.capture.channel_capacity);
    if !config.capture.ignore_apps.is_empty() {
        println!("  Ignored apps: {}", config.capture.ignore_apps.join(", "));
    }
    if config.devices.is_empty() {
        println!("  Devices: all keyboards");
    } else {
        println!("  Devices: {}", config.devices.len());
        for device in &config.devices {
            println!("    - {}", device.name);
        }
    }
    Ok(())
}

fn cmd_devices() -> miette::Result<()> {
    println!("Available input devices:\n");

    let mut paths: Vec<PathBuf> = std::fs::read_dir("/dev/input")
        .into_diagnostic()?
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
        // Skip devices we can't open
        let Ok(device) = evdev::Device::open(&path) else {
            continue;
        };

        let name = device.name().unwrap_or("Unknown");
        let id = device.input_id();
        let is_keyboard = device.supported_events().contains(evdev::EventType::KEY)
            && device
                .supported_keys()
                .map(|keys| keys.contains(evdev::Key::KEY_A))
                .unwrap_or(false);
        let device_type = if is_keyboard { "keyboard" } else { "other" };

        println!("  {} [{}]", name, device_type);
        println!("    Path: {}", path.display());
        println!("    ID: {:04x}:{:04x}", id.vendor(), id.product());
        println!();
    }

    Ok(())
}

/// Where query commands are answered
enum Backend {
    Daemon(PathBuf),
    Database {
        store: StatsStore,
        export_path: PathBuf,
    },
}

impl Backend {
    fn select(cli: &Cli, config_path: &Path) -> miette::Result<Self> {
        if let Some(database) = &cli.database {
            let path: PathBuf = shellexpand::tilde(database).into_owned().into();
            let store = StatsStore::open(&path).into_diagnostic()?;
            let export_path = keytally_config::load_config(config_path)?.global.export_path;
            return Ok(Backend::Database { store, export_path });
        }

        let socket = match &cli.socket {
            Some(socket) => shellexpand::tilde(socket).into_owned().into(),
            None => default_socket_path(),
        };
        Ok(Backend::Daemon(socket))
    }

    fn send(&self, request: IpcRequest) -> miette::Result<IpcResponse> {
        match self {
            Backend::Daemon(socket) => client::send(socket, &request).into_diagnostic(),
            Backend::Database { store, export_path } => {
                Ok(offline::handle(store, request, export_path))
            }
        }
    }
}

fn cmd_query(backend: &Backend, command: &Commands) -> miette::Result<()> {
    let headings = headings(command);

    for (index, request) in command.requests().into_iter().enumerate() {
        let response = backend.send(request)?;
        let text = output::render(response).map_err(|message| miette::miette!("{}", message))?;

        match headings.get(index) {
            Some(heading) if !heading.is_empty() => println!("{}", heading),
            _ => {}
        }
        println!("{}", text);
    }
    Ok(())
}
