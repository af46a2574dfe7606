//! # pulse
//!
//! Keepalive server binary: loads settings, installs logging and metrics,
//! and serves the host page and the `/ws` endpoint until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pulse_logging::LogFormat;
use pulse_server::ServerConfig;
use pulse_server::server::PulseServer;
use pulse_settings::PulseSettings;

/// Ping/pong keepalive server.
#[derive(Parser, Debug)]
#[command(name = "pulse", about = "Ping/pong keepalive WebSocket server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the settings file (default `~/.pulse/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, settings: &mut PulseSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(pulse_settings::settings_path);
    let mut settings = pulse_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    cli.apply(&mut settings);

    let _ = pulse_logging::init_subscriber(
        settings.logging.level.as_filter_str(),
        LogFormat::from_json_flag(settings.logging.json),
    );

    let metrics_handle =
        pulse_server::metrics::install_recorder().context("Failed to install metrics recorder")?;

    let config = ServerConfig::from(&settings);
    tracing::info!(
        addr = %config.addr(),
        window = ?config.keepalive.window,
        period = ?config.keepalive.heartbeat_period(),
        write_timeout = ?config.keepalive.write_timeout,
        max_frame_bytes = config.keepalive.max_frame_bytes,
        "starting pulse server"
    );

    let server = PulseServer::new(config).with_metrics(metrics_handle);
    let (addr, handle) = server.listen().await.context("Failed to start server")?;
    tracing::info!(%addr, "ready");

    let shutdown = std::sync::Arc::clone(server.shutdown());
    let _signal = tokio::spawn(async move { shutdown.shutdown_on_ctrl_c().await });

    handle
        .await
        .context("Server task panicked")?
        .context("Server failed")?;
    Ok(())
}
