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

//! One-shot forced discharge at the most expensive evening hour
//!
//! Once a day the armer looks at the price forecast for the discharge
//! window, picks the best hour and schedules a single callback for it.
//! Arming again replaces the pending callback; there is never more than one.

use super::{TickOutcome, apply_mode, separator};
use crate::clock::until;
use crate::config::DischargeConfig;
use crate::traits::{InverterControl, PriceProvider};
use crate::trigger::Trigger;
use anyhow::{Result, bail};
use chrono::{Duration, NaiveDateTime, NaiveTime};
use parking_lot::Mutex;
use solax_types::{HourlySample, InverterMode, ManualSubMode};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::AbortHandle;
use tracing::{error, info, warn};

/// The pending discharge callback
#[derive(Debug)]
pub struct ArmedTrigger {
    pub fire_at: NaiveDateTime,
    pub best_hour: u32,
    pub best_price: f64,
    generation: u64,
    timer: AbortHandle,
}

/// What an arming attempt did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArmOutcome {
    Armed {
        fire_at: NaiveDateTime,
        best_hour: u32,
        best_price: f64,
    },
    /// Best price under the minimum; any pending trigger was cancelled
    BelowThreshold { best_hour: u32, best_price: f64 },
    /// Computed fire time is already in the past
    AlreadyPassed { fire_at: NaiveDateTime },
    /// Forecast missing or without hours in the window
    Unavailable,
}

#[derive(Clone)]
pub struct PriceArmer {
    control: Arc<dyn InverterControl>,
    prices: Arc<dyn PriceProvider>,
    config: Arc<DischargeConfig>,
    armed: Arc<Mutex<Option<ArmedTrigger>>>,
    generation: Arc<AtomicU64>,
}

impl fmt::Debug for PriceArmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriceArmer")
            .field("config", &self.config)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

impl PriceArmer {
    pub fn new(
        control: Arc<dyn InverterControl>,
        prices: Arc<dyn PriceProvider>,
        config: DischargeConfig,
    ) -> Self {
        info!(
            "Price armer initialized | window {:02}-{:02}h, min price {} CZK/kWh, min battery {}%",
            config.window.start_hour, config.window.end_hour, config.min_price, config.min_battery
        );
        Self {
            control,
            prices,
            config: Arc::new(config),
            armed: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn arm_trigger(&self) -> Trigger {
        Trigger::Daily {
            hour: self.config.arm_hour,
            minute: self.config.arm_minute,
        }
    }

    pub fn guard_trigger(&self) -> Trigger {
        Trigger::EveryMinute {
            first_hour: self.config.guard_start_hour,
            last_hour: self.config.guard_end_hour,
        }
    }

    /// `(fire_at, best_hour)` of the pending trigger
    pub fn pending(&self) -> Option<(NaiveDateTime, u32)> {
        self.armed.lock().as_ref().map(|t| (t.fire_at, t.best_hour))
    }

    /// Arm at startup, unless the discharge window has already begun
    pub async fn arm_on_startup(&self, now: NaiveDateTime) -> Option<ArmOutcome> {
        let window_start = now.date().and_time(
            NaiveTime::from_hms_opt(self.config.window.start_hour, 0, 0).unwrap_or(NaiveTime::MIN),
        );
        if now > window_start {
            info!(
                "Not arming for today: {} is after window start {:02}:00",
                now.format("%H:%M"),
                self.config.window.start_hour
            );
            return None;
        }
        Some(self.arm(now).await)
    }

    pub async fn arm(&self, now: NaiveDateTime) -> ArmOutcome {
        separator("Evaluating prices for forced discharge...");

        let Some(forecast) = self.prices.forecast().await else {
            warn!("⚠️ Price forecast unavailable; aborting check");
            return ArmOutcome::Unavailable;
        };

        let window: Vec<HourlySample> = forecast
            .into_iter()
            .filter(|s| s.timestamp.date() == now.date() && self.config.window.contains(s.hour()))
            .collect();

        let Some(best) = window
            .iter()
            .copied()
            .max_by(|a, b| a.value.total_cmp(&b.value))
        else {
            warn!(
                "⚠️ No hourly prices in window {:02}-{:02}h; aborting",
                self.config.window.start_hour, self.config.window.end_hour
            );
            return ArmOutcome::Unavailable;
        };

        let best_hour = best.hour();
        let best_price = best.value;

        if best_price < self.config.min_price {
            self.cancel("best price below threshold");
            info!(
                "Not arming: best {best_hour:02}:00 = {best_price} CZK/kWh < {} CZK/kWh",
                self.config.min_price
            );
            return ArmOutcome::BelowThreshold {
                best_hour,
                best_price,
            };
        }

        let mut fire_at = best.hour_start();
        if fire_at < now {
            info!("Trigger {fire_at} already passed; skipping");
            return ArmOutcome::AlreadyPassed { fire_at };
        }

        if let Some(previous) = window.iter().find(|s| s.hour() + 1 == best_hour)
            && (previous.value - best_price).abs() < self.config.price_continuity_delta
        {
            fire_at -= Duration::minutes(self.config.early_start_minutes);
            info!(
                "Previous hour {:02}:00 ({} CZK/kWh) close to best; starting {}m earlier",
                previous.hour(),
                previous.value,
                self.config.early_start_minutes
            );
        }

        self.schedule(now, fire_at, best_hour, best_price);
        ArmOutcome::Armed {
            fire_at,
            best_hour,
            best_price,
        }
    }

    /// Cancel-then-set under one lock acquisition
    fn schedule(&self, now: NaiveDateTime, fire_at: NaiveDateTime, best_hour: u32, best_price: f64) {
        let mut armed = self.armed.lock();
        if let Some(previous) = armed.take() {
            previous.timer.abort();
            info!("Cancelled pending discharge at {} (re-arm)", previous.fire_at);
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let delay = until(now, fire_at);
        let this = self.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The callback runs as its own task so a later cancel cannot interrupt it
            tokio::spawn(async move { this.fire(generation).await });
        })
        .abort_handle();

        *armed = Some(ArmedTrigger {
            fire_at,
            best_hour,
            best_price,
            generation,
            timer,
        });
        info!("✅ Armed discharge at {fire_at} (best {best_hour:02}:00, {best_price} CZK/kWh)");
    }

    pub fn cancel(&self, reason: &str) {
        if let Some(previous) = self.armed.lock().take() {
            previous.timer.abort();
            info!("Cancelled pending discharge at {} ({reason})", previous.fire_at);
        }
    }

    async fn fire(&self, generation: u64) {
        let _clear = ClearOnExit {
            armed: &self.armed,
            generation,
        };

        let fired = self.armed.lock().as_ref().map(|t| (t.fire_at, t.best_hour));
        if let Some((fire_at, best_hour)) = fired {
            separator(&format!("Trigger fired at {fire_at} for best {best_hour:02}:00"));
        }

        if let Err(e) = self.discharge_if_battery_ok().await {
            error!("❌ Error during discharge trigger: {e:#}");
        }
    }

    async fn discharge_if_battery_ok(&self) -> Result<()> {
        let Some(battery) = self.control.read_battery_percent().await else {
            bail!("battery level not available");
        };
        let Some(mode) = self.control.read_mode().await else {
            bail!("current inverter mode not available");
        };

        info!(" - Current mode: {mode}");
        info!(" - Current battery level: {battery}%");

        if battery < self.config.min_battery {
            info!(
                "Battery {battery}% < {}%; not discharging",
                self.config.min_battery
            );
            return Ok(());
        }

        if !mode.is_automatic() {
            warn!("⚠️ Inverter in {mode}, not SELF_USE or FEED_IN_PRIORITY; not interfering");
            return Ok(());
        }

        if apply_mode(self.control.as_ref(), InverterMode::Manual).await != TickOutcome::Applied {
            bail!("could not switch to MANUAL");
        }

        if self
            .control
            .write_manual_sub_mode(ManualSubMode::ForceDischarge)
            .await
        {
            info!("✅ FORCE_DISCHARGE enabled");
            Ok(())
        } else {
            bail!("failed to set FORCE_DISCHARGE")
        }
    }

    /// Evening guard: stop a forced discharge once the battery is drained
    pub async fn guard_battery(&self) -> TickOutcome {
        separator(&format!(
            "Battery guard: ensuring level stays above {}%",
            self.config.min_battery
        ));

        let Some(battery) = self.control.read_battery_percent().await else {
            warn!("⚠️ Battery level not available; aborting check");
            return TickOutcome::Unavailable;
        };
        let Some(mode) = self.control.read_mode().await else {
            warn!("⚠️ Current inverter mode not available; aborting check");
            return TickOutcome::Unavailable;
        };

        info!(" - Current mode: {mode}");
        info!(" - Current battery level: {battery}%");

        if mode != InverterMode::Manual {
            return TickOutcome::Skipped;
        }
        if battery >= self.config.min_battery {
            info!("In MANUAL mode, battery ok; no action");
            return TickOutcome::NoChange;
        }

        info!("Battery low, switching to SELF_USE");
        apply_mode(self.control.as_ref(), InverterMode::SelfUse).await
    }
}

/// Clears the armed state when the callback finishes, however it finishes.
/// A newer arming (different generation) is left untouched.
struct ClearOnExit<'a> {
    armed: &'a Mutex<Option<ArmedTrigger>>,
    generation: u64,
}

impl Drop for ClearOnExit<'_> {
    fn drop(&mut self) {
        let mut armed = self.armed.lock();
        if armed.as_ref().is_some_and(|t| t.generation == self.generation) {
            *armed = None;
        }
    }
}
