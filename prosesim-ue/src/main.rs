//! prosesim device binary
//!
//! Runs one ProSe sidelink device (remote or relay) per process. It
//! implements:
//! - CLI argument parsing
//! - Configuration loading and validation
//! - Task spawning and graceful shutdown
//! - Event logging and relay statistics reporting
//!
//! # Usage
//!
//! ```bash
//! prosesim-ue -c config/remote.yaml
//! prosesim-ue -c config/relay-1.yaml -l debug
//! ```

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use prosesim_common::config::DeviceConfig;
use prosesim_common::logging::{init_logging, LogLevel};
use prosesim_ue::{
    BearerMessage, DeviceTaskBase, ProseTask, RelayStats, SidelinkTask, Task,
    DEFAULT_CHANNEL_CAPACITY,
};

/// prosesim - ProSe sidelink relay device simulator
#[derive(Parser, Debug)]
#[command(name = "prosesim-ue")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the device configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long = "log-level", default_value = "info")]
    log_level: String,
}

fn load_config(path: &str) -> Result<DeviceConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration file {path}"))?;
    let config: DeviceConfig =
        serde_yaml::from_str(&contents).context("failed to parse configuration file")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(args: Args) -> Result<()> {
    let level: LogLevel = args
        .log_level
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    init_logging(level);

    let config = load_config(&args.config_file)?;
    info!(
        "Starting device: l2_id={}, role={}, relay_code={}",
        config.l2_id, config.role, config.relay_code
    );

    let (task_base, prose_rx, sidelink_rx, mut bearer_rx, mut event_rx) =
        DeviceTaskBase::new(config, DEFAULT_CHANNEL_CAPACITY);

    let mut prose_task = ProseTask::new(task_base.clone());
    let mut sidelink_task = SidelinkTask::new(task_base.clone());

    let prose_handle = tokio::spawn(async move { prose_task.run(prose_rx).await });
    let sidelink_handle = tokio::spawn(async move { sidelink_task.run(sidelink_rx).await });

    // Event consumer: logs the stream and folds it into statistics
    let stats_handle = tokio::spawn(async move {
        let mut stats = RelayStats::new();
        while let Some(event) = event_rx.recv().await {
            tracing::debug!("ProSe event: {:?}", event);
            stats.record(&event);
        }
        stats
    });

    // Bearer consumer: the networking layer behind the relay service
    let bearer_handle = tokio::spawn(async move {
        while let Some(msg) = bearer_rx.recv().await {
            match msg {
                BearerMessage::ActivateDataPath {
                    peer_l2_id,
                    relay_code,
                } => info!(
                    "Data path activated: peer_l2_id={}, relay_code={}",
                    peer_l2_id, relay_code
                ),
                BearerMessage::DeactivateDataPath {
                    peer_l2_id,
                    relay_code,
                } => info!(
                    "Data path deactivated: peer_l2_id={}, relay_code={}",
                    peer_l2_id, relay_code
                ),
            }
        }
    });

    signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("Shutdown requested");

    task_base.shutdown_all().await;
    let _ = prose_handle.await;
    let _ = sidelink_handle.await;

    // Tasks dropped their channel ends; the consumers drain and finish
    drop(task_base);
    let _ = bearer_handle.await;
    match stats_handle.await {
        Ok(stats) => info!("Final statistics: {}", stats),
        Err(e) => warn!("Statistics consumer failed: {}", e),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
