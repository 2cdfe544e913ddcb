//! # tidegate
//!
//! Gateway binary: loads settings, wires the upstream backend into the
//! HTTP server and serves until a shutdown signal.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tidegate_server::config::ServerConfig;
use tidegate_server::metrics::install_recorder;
use tidegate_server::server::GatewayServer;
use tidegate_server::upstream::HttpBackend;
use tidegate_settings::GatewaySettings;

/// OpenAI-compatible gateway.
#[derive(Parser, Debug)]
#[command(name = "tidegate", about = "OpenAI-compatible chat gateway")]
struct Cli {
    /// Settings file (defaults to `~/.tidegate/settings.json`).
    #[arg(long, env = "TIDEGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings, 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    fn load_settings(&self) -> Result<GatewaySettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(tidegate_settings::settings_path);
        let mut settings = tidegate_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.load_settings()?;

    tidegate_core::logging::init_subscriber(&settings.logging.level, settings.logging.format);

    let config = ServerConfig::from_settings(&settings);
    let backend = HttpBackend::new(settings.upstream.clone()).context("Failed to build upstream client")?;
    let mut server = GatewayServer::new(config.clone(), Arc::new(backend));
    match install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics recorder unavailable, /metrics disabled"),
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;
    let addr = listener.local_addr().context("Failed to read bound address")?;
    tracing::info!(
        %addr,
        models = config.models.len(),
        auth = !config.api_keys.is_empty(),
        "tidegate listening"
    );

    let shutdown = Arc::clone(server.shutdown());
    let signals = Arc::clone(&shutdown);
    let _signal_task = tokio::spawn(async move { signals.listen_for_signals().await });

    match shutdown.drain(server.serve(listener), config.shutdown_timeout).await {
        Some(result) => result.context("Server error")?,
        None => tracing::warn!(
            active_streams = server.active_streams(),
            "forced exit with streams open"
        ),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
