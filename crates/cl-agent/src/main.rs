//! cl-agent: CAN bus demo traffic generator and frame recorder.
//!
//! Opens a SocketCAN interface, then either sends periodic test frames
//! (`demo`) or records every received frame to rotating ASC logs (`record`)
//! until Ctrl-C.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cl_agent::{AgentConfig, Cli, Mode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "cl-agent starting");

    // ── Load config ─────────────────────────────────────────────
    let mut config = match &cli.config {
        Some(path) => AgentConfig::from_file(path)?,
        None => AgentConfig::default(),
    };
    config.apply_cli(&cli);
    tracing::info!(
        device = %config.device,
        bitrate = config.can.bitrate,
        receive_timeout_ms = config.receive_timeout_ms,
        "config loaded"
    );

    run(cli.mode(), config).await?;

    tracing::info!("cl-agent stopped");
    Ok(())
}

#[cfg(target_os = "linux")]
async fn run(mode: Mode, config: AgentConfig) -> anyhow::Result<()> {
    use std::sync::Arc;

    use cl_canbus::CanBus;

    let device = config.device.clone();
    let bus = tokio::task::spawn_blocking(move || CanBus::init(&device)).await??;

    cl_agent::run_mode(Arc::new(bus), mode, config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    })
    .await
}

#[cfg(not(target_os = "linux"))]
async fn run(_mode: Mode, config: AgentConfig) -> anyhow::Result<()> {
    anyhow::bail!("SocketCAN is only available on Linux (device {})", config.device)
}
