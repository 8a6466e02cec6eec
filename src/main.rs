//! Herald - game server <-> Discord chat relay
//!
//! Runs beside a game server, reading its chat and player events as JSON
//! lines on stdin and posting them to a Discord channel through a webhook.
//! Messages typed in that channel come back as broadcasts on stdout.

mod bridge;
mod common;
mod config;
mod discord;
mod game;

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use bridge::EventBridge;
use config::{env::get_config_path, SettingsStore};
use discord::{DiscordConnector, WebhookDispatcher};
use game::ConsoleServer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging. stdout belongs to the game console.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Herald v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let settings = SettingsStore::open(config_path.as_str()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} is properly formatted.", config_path);
        e
    })?;
    let settings = Arc::new(settings);

    let config = settings.snapshot();
    info!("Configuration loaded successfully");
    info!("  Channel: {}", config.discord.channel_id);
    info!("  Mass mention blocking: {}", config.discord.block_mass_mentions);
    info!(
        "  Events: join={} leave={} death={} chat={}",
        config.events.join.enabled,
        config.events.leave.enabled,
        config.events.death.enabled,
        config.chat.enabled
    );

    // ============================================================
    // Wire up the game console, webhook and bridge
    // ============================================================
    let (console, console_tasks) = ConsoleServer::spawn(tokio::io::stdin(), tokio::io::stdout());
    let dispatcher = Arc::new(WebhookDispatcher::new(Arc::clone(&settings))?);
    let bridge = Arc::new(EventBridge::new(
        Arc::clone(&settings),
        dispatcher,
        console,
    ));

    // Reload requests from the console and from SIGHUP
    let (reload_tx, mut reload_rx) = mpsc::unbounded_channel::<()>();
    {
        let mut console_reloads = console_tasks.reload_rx;
        let tx = reload_tx.clone();
        tokio::spawn(async move {
            while console_reloads.recv().await.is_some() {
                if tx.send(()).is_err() {
                    break;
                }
            }
            debug!("Console reload forwarding ended");
        });
    }
    #[cfg(unix)]
    {
        let mut hangup = signal::unix::signal(signal::unix::SignalKind::hangup())?;
        let tx = reload_tx.clone();
        tokio::spawn(async move {
            while hangup.recv().await.is_some() {
                info!("Received SIGHUP");
                if tx.send(()).is_err() {
                    break;
                }
            }
        });
    }
    drop(reload_tx);

    // ============================================================
    // Start the relay
    // ============================================================
    info!("Starting Discord session...");
    let handle = match bridge.start(&DiscordConnector::new()).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start relay: {}", e);
            // Give a moment for error logs to flush
            tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
            std::process::exit(1);
        }
    };
    info!("Relay running");

    // ============================================================
    // Run until shutdown
    // ============================================================
    let mut console_reader = console_tasks.reader;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown signal received - stopping relay...");
                break;
            }
            _ = &mut console_reader => {
                info!("Game console closed - stopping relay...");
                break;
            }
            Some(()) = reload_rx.recv() => {
                if let Err(e) = settings.reload() {
                    warn!("Reload failed, keeping previous settings: {}", e);
                }
            }
        }
    }

    handle.shutdown().await;

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
