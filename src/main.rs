//! Dustcast: dust storm risk monitor.
//!
//! Single-binary Tokio application that:
//! 1. Pulls surface temperature and vegetation/dust indices for the region
//! 2. Fuses them into a dust risk index
//! 3. Projects a multi-day risk forecast
//! 4. Keeps every expensive step in a durable on-disk cache

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use common::{Envelope, MonitorConfig};
use dust_engine::DustAnalyzer;
use earth_engine_client::EarthEngineClient;
use smart_cache::CacheStore;

/// Dust storm risk monitor
#[derive(Parser)]
#[command(name = "dustcast", about = "Dust storm risk monitor with durable caching")]
struct Cli {
    /// Path to the TOML config file (optional).
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Current conditions and dust risk index.
    Current {
        /// Look-back window in days.
        #[arg(long)]
        days_back: Option<i64>,
    },
    /// Multi-day dust risk forecast.
    Forecast {
        /// Number of days to project.
        #[arg(long)]
        days: Option<usize>,
    },
    /// Inspect or maintain the cache.
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
    /// System status including cache performance.
    Status,
    /// Health check; exits non-zero when the cache is unusable.
    Health,
    /// Refresh conditions and forecast periodically until Ctrl+C.
    Watch,
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Hit rate, counters, and on-disk usage.
    Stats,
    /// Remove every cached record and reset the counters.
    Clear,
    /// Remove records older than the default TTL.
    Sweep,
}

fn write_json<T: Serialize>(value: &T) -> common::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{text}");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match write_json(value) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to serialize output: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_envelope<T: Serialize>(envelope: &Envelope<T>) -> ExitCode {
    let code = print_json(envelope);
    if envelope.is_success() {
        code
    } else {
        ExitCode::FAILURE
    }
}

fn build_analyzer(cfg: &MonitorConfig) -> common::Result<DustAnalyzer> {
    let store = CacheStore::open(
        &cfg.cache.dir,
        Duration::from_secs(cfg.cache.default_ttl_minutes * 60),
    )?;
    info!("Cache root: {}", store.dir().display());
    let backend = EarthEngineClient::new(&cfg.backend, &cfg.project)?;
    info!("Backend endpoint: {}", backend.endpoint());
    Ok(DustAnalyzer::new(cfg.clone(), Arc::new(store), Arc::new(backend)))
}

async fn watch(analyzer: &DustAnalyzer) {
    let cfg = analyzer.config();
    let mut data_tick = tokio::time::interval(Duration::from_secs(
        cfg.timing.data_update_interval_minutes * 60,
    ));
    data_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut forecast_tick = tokio::time::interval(Duration::from_secs(
        cfg.timing.forecast_update_interval_minutes * 60,
    ));
    forecast_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Watching {}: conditions every {}m, forecast every {}m. Press Ctrl+C to stop.",
        cfg.location.display_name,
        cfg.timing.data_update_interval_minutes,
        cfg.timing.forecast_update_interval_minutes
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = data_tick.tick() => {
                match analyzer.current_conditions(cfg.analysis.days_back).await {
                    Envelope::Success(snapshot) => info!(
                        "Conditions: risk={:.3} ({}), LST={:.1}°C, NDVI={:.3}, NDDI={:.3}, hit_rate={}%",
                        snapshot.risk.dust_risk_index,
                        snapshot.risk.risk_level.as_str(),
                        snapshot.modis.lst_day_mean,
                        snapshot.landsat.ndvi_mean,
                        snapshot.landsat.nddi_mean,
                        snapshot.cache_stats.hit_rate_percent
                    ),
                    Envelope::Failure(report) => warn!("Conditions refresh failed: {}", report.error),
                }
            }
            _ = forecast_tick.tick() => {
                match analyzer.forecast(cfg.analysis.forecast_days).await {
                    Envelope::Success(days) => {
                        let peak = days
                            .iter()
                            .max_by(|a, b| a.risk_score.total_cmp(&b.risk_score));
                        if let Some(peak) = peak {
                            info!(
                                "Forecast: {} days, peak risk {:.3} on {} ({})",
                                days.len(),
                                peak.risk_score,
                                peak.date,
                                peak.risk_level.as_str()
                            );
                        }
                    }
                    Envelope::Failure(report) => warn!("Forecast refresh failed: {}", report.error),
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging. Stdout carries JSON output, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dustcast=info,smart_cache=info,dust_engine=info,earth_engine_client=info".into()
            }),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Using project: {}", cfg.project);
    info!(
        "Cache: {} (default TTL {}m, {})",
        cfg.cache.dir,
        cfg.cache.default_ttl_minutes,
        if cfg.cache.enabled { "enabled" } else { "disabled" }
    );

    let analyzer = match build_analyzer(&cfg) {
        Ok(a) => a,
        Err(e) => {
            error!("Startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Current { days_back } => {
            let days_back = days_back.unwrap_or(cfg.analysis.days_back);
            if let Err(issue) = config::check_days_back(days_back, "--days-back") {
                error!("Invalid argument: {}", issue);
                return ExitCode::FAILURE;
            }
            print_envelope(&analyzer.current_conditions(days_back).await)
        }
        Command::Forecast { days } => {
            let days = days.unwrap_or(cfg.analysis.forecast_days);
            if let Err(issue) = config::check_forecast_days(days, "--days") {
                error!("Invalid argument: {}", issue);
                return ExitCode::FAILURE;
            }
            print_envelope(&analyzer.forecast(days).await)
        }
        Command::Cache { action } => match action {
            CacheCommand::Stats => print_json(&analyzer.cache_stats()),
            CacheCommand::Clear => print_envelope(&analyzer.clear_cache()),
            CacheCommand::Sweep => {
                let cleared = analyzer.clear_expired();
                print_json(&json!({ "cleared_entries": cleared }))
            }
        },
        Command::Status => print_json(&analyzer.system_status()),
        Command::Health => {
            let health = analyzer.health();
            let code = print_json(&health);
            if health.cache_healthy {
                code
            } else {
                ExitCode::FAILURE
            }
        }
        Command::Watch => {
            watch(&analyzer).await;
            ExitCode::SUCCESS
        }
    }
}
