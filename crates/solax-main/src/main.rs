// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Solax automation.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz


mod config;

use anyhow::{Context, Result};
use config::AppConfig;
use solax_adapters::{MeteosourceClient, OtePriceClient, SysfsConnectionSensor};
use solax_core::{
    BatteryGuard, Clock, ConnectionSensor, ExportLimiter, InverterControl, LocalClock, PriceArmer,
    PriceProvider, WeatherProvider, WeatherStateMachine, spawn_schedule,
};
use solax_modbus::{ProcessShutdown, handshake, open_device};
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    // Handle command line arguments
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" => {
                println!("Solax automation - inverter mode and export control");
                println!("Version: {VERSION}");
                println!();
                println!("Usage: solax-automation [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help    Print this help message");
                println!("  -v, --version Print version");
                println!();
                println!("Configuration is read from $SOLAX_CONFIG, /data/options.json,");
                println!("config.toml or config.json, in that order.");
                return Ok(());
            }
            "--version" | "-v" => {
                println!("{VERSION}");
                return Ok(());
            }
            other => {
                eprintln!("Ignoring unknown argument '{other}'");
            }
        }
    }

    let config = AppConfig::load()?;
    init_tracing(&config.system.log_level)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(run(&config))
}

/// RUST_LOG wins over the configured level
fn init_tracing(level: &str) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Setting default subscriber failed")
}

fn log_summary(config: &AppConfig) {
    info!("🚀 Starting Solax automation v{VERSION}");
    info!("📋 Configuration Summary:");
    info!(
        "   Inverter: {}:{} (unit {})",
        config.inverter.host, config.inverter.port, config.inverter.unit_id
    );
    info!(
        "   Request delay: {}ms, idle timeout: {}s",
        config.inverter.request_delay_ms, config.inverter.idle_timeout_secs
    );
    info!(
        "   Safety: {} failures, {} writes per {}h",
        config.safety.max_consecutive_failures,
        config.safety.max_writes_per_window,
        config.safety.write_window_hours
    );
    info!(
        "   Schedulers: battery={}, discharge={}, weather={}, export={}",
        config.battery.enabled,
        config.discharge.enabled,
        config.weather.enabled,
        config.export.enabled
    );
    info!("   Timezone: {}", config.system.timezone);
}

async fn run(config: &AppConfig) -> Result<()> {
    log_summary(config);

    let clock: Arc<dyn Clock> = Arc::new(LocalClock::new(config.timezone()?));
    let stop = Arc::new(Notify::new());
    let fatal = Arc::new(ProcessShutdown::new(
        stop.clone(),
        config.safety.shutdown_grace(),
    ));

    let (device, queue_worker) = open_device(&config.inverter, &config.safety, fatal);
    let serial = match handshake(&device, config.inverter.password).await {
        Ok(serial) => serial,
        Err(e) => {
            error!("❌ Inverter handshake failed: {e:#}");
            device.close().await;
            return Err(e);
        }
    };
    let device = Arc::new(device);
    let control: Arc<dyn InverterControl> = device.clone();

    let prices: Arc<dyn PriceProvider> = Arc::new(OtePriceClient::new(&config.ote, clock.clone())?);
    let weather: Arc<dyn WeatherProvider> = Arc::new(MeteosourceClient::new(&config.meteosource)?);
    let sensor = Arc::new(SysfsConnectionSensor::start(&config.sensor));

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    if config.battery.enabled {
        let guard = Arc::new(BatteryGuard::new(control.clone(), config.battery.clone()));
        tasks.push(spawn_schedule(
            "Battery guard",
            BatteryGuard::trigger(),
            clock.clone(),
            move |now| {
                let guard = guard.clone();
                async move {
                    let outcome = guard.tick(now).await;
                    debug!("Battery guard finished: {outcome:?}");
                }
            },
        ));
    }

    let armer = if config.discharge.enabled {
        let armer = PriceArmer::new(control.clone(), prices.clone(), config.discharge.clone());
        if let Some(outcome) = armer.arm_on_startup(clock.now()).await {
            info!("Startup arming: {outcome:?}");
        }

        let arming = armer.clone();
        tasks.push(spawn_schedule(
            "Price armer",
            armer.arm_trigger(),
            clock.clone(),
            move |now| {
                let armer = arming.clone();
                async move {
                    let outcome = armer.arm(now).await;
                    debug!("Price armer finished: {outcome:?}");
                }
            },
        ));

        let guarding = armer.clone();
        tasks.push(spawn_schedule(
            "Discharge guard",
            armer.guard_trigger(),
            clock.clone(),
            move |_| {
                let armer = guarding.clone();
                async move {
                    let outcome = armer.guard_battery().await;
                    debug!("Discharge guard finished: {outcome:?}");
                }
            },
        ));
        Some(armer)
    } else {
        None
    };

    if config.weather.enabled {
        let machine = Arc::new(WeatherStateMachine::new(
            control.clone(),
            weather.clone(),
            config.weather.clone(),
        ));
        tasks.push(spawn_schedule(
            "Weather state machine",
            WeatherStateMachine::trigger(),
            clock.clone(),
            move |now| {
                let machine = machine.clone();
                async move {
                    let outcome = machine.tick(now).await;
                    debug!("Weather check finished: {outcome:?}");
                }
            },
        ));
    }

    if config.export.enabled {
        let limiter = Arc::new(ExportLimiter::new(
            control.clone(),
            prices.clone(),
            weather.clone(),
            sensor.clone(),
            config.export.clone(),
        ));
        tasks.push(tokio::spawn(limiter.run(clock.clone(), sensor.subscribe())));
    }

    if tasks.is_empty() {
        warn!("⚠️ Every scheduler is disabled; only the connection is kept alive");
    }
    info!("✅ Solax automation running for inverter {serial}");

    wait_for_stop(&stop).await?;

    info!("Stopping schedulers...");
    for task in &tasks {
        task.abort();
    }
    if let Some(armer) = &armer {
        armer.cancel("application shutdown");
    }

    device.close().await;
    if let Err(e) = queue_worker.await {
        warn!("⚠️ Request queue worker ended abnormally: {e}");
    }

    device
        .governor()
        .check()
        .context("Stopped by the safety governor")?;

    info!("👋 Solax automation stopped");
    Ok(())
}

/// Resolves on Ctrl+C, SIGTERM or a safety governor trip
async fn wait_for_stop(fatal: &Notify) -> Result<()> {
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::select! {
        () = fatal.notified() => {
            warn!("⚠️ Shutdown requested by the safety governor");
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Received Ctrl+C");
        }
        _ = terminate.recv() => {
            info!("Received SIGTERM");
        }
    }
    Ok(())
}
