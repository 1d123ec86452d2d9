/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

use daybreak::clock::{parse_timezone, SystemClock};
use daybreak::config::ConfigManager;
use daybreak::controller::{AlarmController, CommandPlayer, DirectoryEpisodes, Player, PlayerState};
use daybreak::scheduler::AlarmScheduler;
use daybreak::store::FileAlarmStore;

// ── CLI argument definition ───────────────────────────────────────────────────

/// Daybreak daily podcast alarm.
///
/// Example:
///   daybreak -c /etc/daybreak.yaml -t Europe/London
#[derive(Debug, Parser)]
#[command(name = "daybreak", about = "Daily podcast alarm", long_about = None)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// IANA timezone, overriding the configuration file.
    #[arg(short = 't', long = "timezone")]
    timezone: Option<String>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!(config = ?cli.config, timezone = ?cli.timezone, "Daybreak starting up...");

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // ── Load configuration ────────────────────────────────────────────────────
    let mut config_manager = ConfigManager::new();
    match &cli.config {
        Some(path) => config_manager
            .load_from_file(path)
            .context("Failed to load configuration")?,
        None => warn!("No configuration file provided, using default settings"),
    }
    if let Some(name) = &cli.timezone {
        config_manager.set_timezone(parse_timezone(name)?);
    }
    let config = config_manager.config().clone();

    // ── Wire up ───────────────────────────────────────────────────────────────
    let clock = Arc::new(SystemClock::new(config.timezone));
    let scheduler = AlarmScheduler::new(clock, Handle::current());
    let player = Arc::new(CommandPlayer::new(
        config.player.program.clone(),
        config.player.args.clone(),
    ));
    let episodes = Arc::new(DirectoryEpisodes::new(
        config.episodes.directory.clone(),
        config.episodes.extensions.clone(),
    ));

    // Reads the store and may touch the disk; keep it off the runtime threads
    let controller = {
        let scheduler = scheduler.clone();
        let player = player.clone();
        let lead = config.preload_lead();
        let store = FileAlarmStore::open(config.store_path.clone());
        tokio::task::spawn_blocking(move || {
            AlarmController::new(scheduler, episodes, player, Box::new(store), lead)
        })
        .await
        .context("Controller setup task failed")??
    };

    let (time, enabled) = controller.next_alarm_time()?;
    info!(%time, enabled, "alarm configured");
    match scheduler.armed() {
        Some(armed) => info!(alarm = %armed.alarm, fires_at = %armed.fires_at, "next alarm armed"),
        None => warn!("no alarm armed"),
    }

    // ── Run until interrupted ─────────────────────────────────────────────────
    tokio::signal::ctrl_c()
        .await
        .context("Cannot listen for Ctrl-C")?;
    info!("Shutting down");

    scheduler.shutdown();
    if player.state() == PlayerState::Playing {
        player.stop();
    }
    Ok(())
}
