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

use super::{TickOutcome, separator};
use crate::clock::Clock;
use crate::config::ExportConfig;
use crate::traits::{ConnectionSensor, InverterControl, PriceProvider, WeatherProvider};
use crate::trigger::Trigger;
use chrono::{NaiveDateTime, Timelike};
use parking_lot::Mutex;
use solax_types::{ConnectionSignal, GridConnection, average};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

/// Export ceiling tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportCeiling {
    Min,
    Reduced,
    Max,
}

impl fmt::Display for ExportCeiling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Min => f.write_str("min"),
            Self::Reduced => f.write_str("reduced"),
            Self::Max => f.write_str("max"),
        }
    }
}

/// Keeps the grid export limit in line with price and grid connection.
///
/// Timer ticks and sensor edges are both handled by [`ExportLimiter::run`]
/// on one task, so checks never overlap.
pub struct ExportLimiter {
    control: Arc<dyn InverterControl>,
    prices: Arc<dyn PriceProvider>,
    weather: Arc<dyn WeatherProvider>,
    sensor: Arc<dyn ConnectionSensor>,
    config: ExportConfig,
    signal: Mutex<ConnectionSignal>,
}

impl fmt::Debug for ExportLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportLimiter")
            .field("config", &self.config)
            .field("signal", &*self.signal.lock())
            .finish_non_exhaustive()
    }
}

impl ExportLimiter {
    pub fn new(
        control: Arc<dyn InverterControl>,
        prices: Arc<dyn PriceProvider>,
        weather: Arc<dyn WeatherProvider>,
        sensor: Arc<dyn ConnectionSensor>,
        config: ExportConfig,
    ) -> Self {
        info!(
            "Export limiter initialized | min {}W, reduced {}W, max {}W, price floor {} CZK/kWh",
            config.power.min, config.power.reduced, config.power.max, config.min_price
        );
        Self {
            control,
            prices,
            weather,
            sensor,
            config,
            signal: Mutex::new(ConnectionSignal::new()),
        }
    }

    pub fn trigger(&self) -> Trigger {
        Trigger::Hourly {
            minute: 0,
            second: 30,
            first_hour: self.config.active_start_hour,
            last_hour: self.config.active_end_hour,
        }
    }

    pub fn watts(&self, ceiling: ExportCeiling) -> u32 {
        match ceiling {
            ExportCeiling::Min => self.config.power.min,
            ExportCeiling::Reduced => self.config.power.reduced,
            ExportCeiling::Max => self.config.power.max,
        }
    }

    /// Ceiling for the given inputs. `quality` is only consulted when disconnected
    /// inside the reduced window; `None` there keeps the max ceiling.
    pub fn choose_ceiling(
        &self,
        connection: GridConnection,
        price: f64,
        hour: u32,
        quality: Option<f64>,
    ) -> ExportCeiling {
        match connection {
            GridConnection::Disconnected => {
                let poor_forecast =
                    quality.is_some_and(|q| q <= self.config.reduced_quality_threshold);
                if self.config.reduced_window.contains(hour) && poor_forecast {
                    ExportCeiling::Reduced
                } else {
                    ExportCeiling::Max
                }
            }
            GridConnection::Connected if price < self.config.min_price => ExportCeiling::Min,
            GridConnection::Connected => ExportCeiling::Max,
        }
    }

    pub async fn run_check(&self, now: NaiveDateTime) -> TickOutcome {
        let connection = self.sensor.state();
        info!("- Connection switch state: {connection}");

        let Some(price) = self.prices.current_hour_price().await else {
            warn!("⚠️ Could not retrieve current price; aborting check");
            return TickOutcome::Unavailable;
        };
        info!("- Current price: {price} CZK/kWh");

        let Some(current) = self.control.read_export_limit_watts().await else {
            warn!("⚠️ Could not retrieve export limit from inverter; aborting check");
            return TickOutcome::Unavailable;
        };
        info!("- Current export limit: {current} W");

        let hour = now.hour();
        let quality = if !connection.is_connected() && self.config.reduced_window.contains(hour) {
            let Some(quality) = self.window_quality(now).await else {
                warn!("⚠️ Weather forecast not available; aborting check");
                return TickOutcome::Unavailable;
            };
            info!("- Midday forecast quality: {quality:.2}");
            Some(quality)
        } else {
            None
        };

        let ceiling = self.choose_ceiling(connection, price, hour, quality);
        let target = self.watts(ceiling);
        if target == current {
            info!("Export limit already at {ceiling} ({target} W); no action needed");
            return TickOutcome::NoChange;
        }

        info!("Switching export limit to {ceiling} ({target} W)");
        match self.control.write_export_limit_watts(i64::from(target)).await {
            Ok(true) => {
                info!("✅ Export limit set to {target} W");
                TickOutcome::Applied
            }
            Ok(false) => {
                error!("❌ Failed to set export limit to {target} W");
                TickOutcome::WriteFailed
            }
            Err(e) => {
                error!("❌ Refusing export limit: {e}");
                TickOutcome::WriteFailed
            }
        }
    }

    /// Average forecast quality over the reduced window of `now`'s day
    async fn window_quality(&self, now: NaiveDateTime) -> Option<f64> {
        let forecast = self.weather.current_forecast().await?;
        let window = self.config.reduced_window;
        let hours: Vec<_> = forecast
            .into_iter()
            .filter(|s| s.timestamp.date() == now.date() && window.contains(s.hour()))
            .collect();
        average(&hours)
    }

    /// Sensor edge handler. Returns `None` when the event was dropped.
    pub async fn on_connection_change(
        &self,
        state: GridConnection,
        now: NaiveDateTime,
    ) -> Option<TickOutcome> {
        separator(&format!("Connection switch changed to {state}"));

        if !self.signal.lock().observe(state) {
            warn!("Detected change to the same state; ignoring event");
            return None;
        }

        if !self.config.is_active_hour(now.hour()) {
            warn!("Detected night time; ignoring event");
            return None;
        }

        Some(self.run_check(now).await)
    }

    /// Startup check, then timer ticks and sensor edges until the sensor closes.
    pub async fn run(
        self: Arc<Self>,
        clock: Arc<dyn Clock>,
        mut events: broadcast::Receiver<GridConnection>,
    ) {
        let trigger = self.trigger();
        info!("Export limiter scheduled {trigger}");

        self.signal.lock().observe(self.sensor.state());
        separator("Running export limit check on startup");
        self.run_check(clock.now()).await;

        loop {
            let now = clock.now();
            let next = trigger.next_after(now);
            debug!("Next export limit check at {next}");

            tokio::select! {
                () = tokio::time::sleep(clock.until(next)) => {
                    separator("Running scheduled export limit check");
                    self.run_check(clock.now()).await;
                }
                event = events.recv() => match event {
                    Ok(state) => {
                        self.on_connection_change(state, clock.now()).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Missed {skipped} connection events; re-reading sensor");
                        let state = self.sensor.state();
                        self.on_connection_change(state, clock.now()).await;
                    }
                    Err(RecvError::Closed) => {
                        warn!("Connection sensor closed; export limiter stopping");
                        return;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedSensor, RecordingInverter, StaticPrices, StaticWeather, Write, at, samples};
    use solax_types::InverterMode;

    struct Fixture {
        inverter: Arc<RecordingInverter>,
        sensor: Arc<FixedSensor>,
        limiter: ExportLimiter,
    }

    fn fixture(
        connection: GridConnection,
        price: f64,
        limit: u32,
        forecast: Vec<solax_types::HourlySample>,
    ) -> Fixture {
        let inverter =
            Arc::new(RecordingInverter::new(InverterMode::SelfUse, 80).with_export_limit(limit));
        let sensor = Arc::new(FixedSensor::new(connection));
        let config = ExportConfig {
            min_price: 0.0,
            ..ExportConfig::default()
        };
        let limiter = ExportLimiter::new(
            inverter.clone(),
            Arc::new(StaticPrices::current(price)),
            Arc::new(StaticWeather::new(forecast)),
            sensor.clone(),
            config,
        );
        Fixture {
            inverter,
            sensor,
            limiter,
        }
    }

    #[test]
    fn test_choose_ceiling() {
        let f = fixture(GridConnection::Connected, 0.0, 0, Vec::new());
        let limiter = &f.limiter;

        assert_eq!(
            limiter.choose_ceiling(GridConnection::Connected, -0.2, 10, None),
            ExportCeiling::Min
        );
        assert_eq!(
            limiter.choose_ceiling(GridConnection::Disconnected, -0.2, 10, None),
            ExportCeiling::Max
        );
        assert_eq!(
            limiter.choose_ceiling(GridConnection::Connected, 0.0, 10, None),
            ExportCeiling::Max
        );
        assert_eq!(
            limiter.choose_ceiling(GridConnection::Disconnected, 1.0, 12, Some(3.0)),
            ExportCeiling::Reduced
        );
        assert_eq!(
            limiter.choose_ceiling(GridConnection::Disconnected, 1.0, 12, Some(3.5)),
            ExportCeiling::Max
        );
        // Window is half-open
        assert_eq!(
            limiter.choose_ceiling(GridConnection::Disconnected, 1.0, 14, Some(1.0)),
            ExportCeiling::Max
        );
        // Reduced never applies while connected
        assert_eq!(
            limiter.choose_ceiling(GridConnection::Connected, 1.0, 12, Some(1.0)),
            ExportCeiling::Max
        );
    }

    #[tokio::test]
    async fn test_negative_price_connected_writes_min() {
        let f = fixture(GridConnection::Connected, -0.2, 3950, Vec::new());

        assert_eq!(f.limiter.run_check(at(10, 0)).await, TickOutcome::Applied);
        assert_eq!(f.inverter.writes(), vec![Write::ExportLimit(100)]);
    }

    #[tokio::test]
    async fn test_negative_price_disconnected_writes_max() {
        let f = fixture(GridConnection::Disconnected, -0.2, 100, Vec::new());

        assert_eq!(f.limiter.run_check(at(10, 0)).await, TickOutcome::Applied);
        assert_eq!(f.inverter.writes(), vec![Write::ExportLimit(3950)]);
    }

    #[tokio::test]
    async fn test_poor_midday_forecast_writes_reduced() {
        let f = fixture(
            GridConnection::Disconnected,
            1.0,
            3950,
            samples(&[(12, 2.0), (13, 3.0), (15, 10.0)]),
        );

        assert_eq!(f.limiter.run_check(at(12, 0)).await, TickOutcome::Applied);
        assert_eq!(f.inverter.writes(), vec![Write::ExportLimit(2000)]);
    }

    #[tokio::test]
    async fn test_matching_limit_writes_nothing() {
        let f = fixture(GridConnection::Connected, 1.0, 3950, Vec::new());

        assert_eq!(f.limiter.run_check(at(10, 0)).await, TickOutcome::NoChange);
        assert_eq!(f.inverter.write_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_limit_aborts() {
        let f = fixture(GridConnection::Connected, -1.0, 3950, Vec::new());
        *f.inverter.export_limit.lock() = None;

        assert_eq!(f.limiter.run_check(at(10, 0)).await, TickOutcome::Unavailable);
        assert_eq!(f.inverter.write_count(), 0);
    }

    #[tokio::test]
    async fn test_repeated_edge_is_ignored() {
        let f = fixture(GridConnection::Disconnected, 1.0, 100, Vec::new());

        let first = f
            .limiter
            .on_connection_change(GridConnection::Disconnected, at(10, 0))
            .await;
        let second = f
            .limiter
            .on_connection_change(GridConnection::Disconnected, at(10, 1))
            .await;

        assert_eq!(first, Some(TickOutcome::Applied));
        assert_eq!(second, None);
        assert_eq!(f.inverter.write_count(), 1);
    }

    #[tokio::test]
    async fn test_night_edge_is_ignored() {
        let f = fixture(GridConnection::Connected, -1.0, 3950, Vec::new());

        let outcome = f
            .limiter
            .on_connection_change(GridConnection::Connected, at(21, 15))
            .await;

        assert_eq!(outcome, None);
        assert_eq!(f.inverter.read_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reacts_to_sensor_edge() {
        struct Fixed(NaiveDateTime);
        impl Clock for Fixed {
            fn now(&self) -> NaiveDateTime {
                self.0
            }
        }

        let f = fixture(GridConnection::Connected, -1.0, 100, Vec::new());
        let events = f.sensor.subscribe();
        let limiter = Arc::new(f.limiter);
        let task = tokio::spawn(limiter.run(Arc::new(Fixed(at(10, 10))), events));

        // Startup check: connected, price below floor, already at min
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(f.inverter.write_count(), 0);

        f.sensor.set(GridConnection::Disconnected);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(f.inverter.writes(), vec![Write::ExportLimit(3950)]);

        task.abort();
    }

    #[test]
    fn test_debug_shows_config_and_signal() {
        let f = fixture(GridConnection::Connected, 0.0, 0, Vec::new());
        let rendered = format!("{:?}", f.limiter);

        assert!(rendered.starts_with("ExportLimiter"));
        assert!(rendered.contains("config"));
        assert!(rendered.contains("signal: ConnectionSignal"));
    }
}
