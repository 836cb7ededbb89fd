//! keytally daemon
//!
//! Reads keyboards, attributes each key-down to the application niri reports
//! as focused, and keeps per-application combination counts.

mod consumer;
mod device;
mod error;
mod ipc;
mod keyboard;
mod niri_ipc;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use keytally_config::Config;
use keytally_core::{
    event_channel, CaptureBridge, CaptureOptions, ForegroundSlot, StatsEngine, StatsStore,
};
use parking_lot::Mutex;
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

use crate::consumer::Consumer;
use crate::error::StartupError;
use crate::ipc::{handle_ipc_connection, IpcServer, RequestHandler};
use crate::keyboard::KeyboardHook;

#[derive(Parser, Debug)]
#[command(name = "keytallyd")]
#[command(about = "Per-application keystroke statistics daemon for niri")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/keytally/config.kdl")]
    config: String,

    /// Statistics database (overrides the configured path)
    #[arg(short, long)]
    database: Option<String>,

    /// IPC socket path (defaults to $XDG_RUNTIME_DIR/keytally.sock)
    #[arg(short, long)]
    socket: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path: PathBuf = shellexpand::tilde(&args.config).into_owned().into();
    let mut config = keytally_config::load_config(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    init_tracing(&config);
    tracing::info!("Configuration: {}", config_path.display());

    if let Some(database) = &args.database {
        config.global.database_path = shellexpand::tilde(database).into_owned().into();
    }
    let socket_path: Option<PathBuf> = args
        .socket
        .as_deref()
        .map(|s| shellexpand::tilde(s).into_owned().into());

    run(config, socket_path).await
}

/// `RUST_LOG` wins, otherwise the configured level
fn init_tracing(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.global.log_level.as_filter())),
        )
        .init();
}

async fn run(config: Config, socket_path: Option<PathBuf>) -> Result<()> {
    let store = StatsStore::open(&config.global.database_path)
        .map_err(StartupError::from)
        .context("Startup failed")?;
    let engine = Arc::new(Mutex::new(StatsEngine::new(
        store,
        config.capture.history_capacity,
    )));

    let (sender, receiver) = event_channel(config.capture.channel_capacity);
    let focus = Arc::new(ForegroundSlot::new());
    let bridge = Arc::new(CaptureBridge::new(
        focus.clone(),
        sender.clone(),
        CaptureOptions {
            count_modifier_keys: config.capture.count_modifier_keys,
            ignore_apps: config.capture.ignore_apps.clone(),
        },
    ));

    let consumer = Consumer::spawn(receiver, Arc::clone(&engine)).context("Startup failed")?;

    let keyboards = device::open_keyboards(&config.devices);
    let hook = match keyboards.and_then(|k| KeyboardHook::install(k, Arc::clone(&bridge))) {
        Ok(hook) => hook,
        Err(e) => {
            consumer.shutdown();
            return Err(e).context("Startup failed");
        }
    };
    for device in hook.devices() {
        tracing::info!("Watching '{}' at {}", device.name, device.path.display());
    }

    let focus_task = niri_ipc::spawn_focus_tracker(Arc::clone(&focus));

    let server = match socket_path {
        Some(path) => IpcServer::bind(path),
        None => IpcServer::new(),
    };
    let server = match server {
        Ok(server) => server,
        Err(e) => {
            hook.unregister().await;
            focus_task.abort();
            consumer.shutdown();
            return Err(e);
        }
    };

    let handler = RequestHandler::new(
        Arc::clone(&engine),
        bridge,
        focus,
        sender,
        hook.devices(),
        config.global.export_path.clone(),
    );

    tracing::info!("keytally daemon running, socket {}", server.socket_path().display());

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    loop {
        tokio::select! {
            accepted = server.accept() => {
                match accepted {
                    Ok(stream) => {
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_ipc_connection(stream, move |req| handler.handle(req)).await {
                                tracing::warn!("IPC connection failed: {:#}", e);
                            }
                        });
                    }
                    Err(e) => tracing::warn!("{:#}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received interrupt");
                break;
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
                break;
            }
        }
    }

    tracing::info!("Shutting down...");

    hook.unregister().await;
    focus_task.abort();
    let processed = consumer.shutdown();
    drop(server);
    drop(handler);

    let engine = engine.lock();
    tracing::info!(
        "Processed {} event(s) this session, {} failed write(s)",
        processed,
        engine.failed()
    );

    Ok(())
}
