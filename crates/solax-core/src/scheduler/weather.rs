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

//! Weather-driven mode selection
//!
//! Two checks exist. The *weather* check compares the average forecast
//! quality of a daytime window against the cloudy threshold and moves
//! between SELF_USE and FEED_IN_PRIORITY. The *outage* check looks at the
//! next few hours against the thunderstorm threshold and can force BACKUP.

use super::{TickOutcome, apply_mode, separator};
use crate::config::{ForecastCheck, WeatherConfig};
use crate::traits::{InverterControl, WeatherProvider};
use crate::trigger::Trigger;
use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use solax_types::{HourlySample, InverterMode, average};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Daylight hours in which each tick also logs PV production
const DC_POWER_HOURS: std::ops::RangeInclusive<u32> = 4..=20;

/// Which evaluation a tick runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeatherCheck {
    /// Cloudy vs. sunny over a daytime window
    Weather {
        start: NaiveDateTime,
        end: NaiveDateTime,
        threshold: f64,
        min_battery: u8,
    },
    /// Thunderstorm risk over the next hours
    Outage {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// Inputs shared by both handlers
#[derive(Debug)]
struct Snapshot {
    mode: InverterMode,
    battery: u8,
    hours: Vec<HourlySample>,
    avg_quality: f64,
}

/// Handler result before any write happens
#[derive(Debug, PartialEq)]
enum Transition {
    Stay,
    Switch(InverterMode),
    /// Weather window is severe; run the outage check instead
    DelegateToOutage,
    /// BACKUP was set by someone else
    ManualOverride,
    Unsupported,
}

pub struct WeatherStateMachine {
    control: Arc<dyn InverterControl>,
    weather: Arc<dyn WeatherProvider>,
    config: WeatherConfig,
    /// True while BACKUP is ours. Held for the whole outage evaluation.
    backup_by_automation: Mutex<bool>,
}

impl fmt::Debug for WeatherStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherStateMachine")
            .field("config", &self.config)
            .field(
                "backup_by_automation",
                &self.backup_by_automation.try_lock().map(|held| *held).ok(),
            )
            .finish_non_exhaustive()
    }
}

impl WeatherStateMachine {
    pub fn new(
        control: Arc<dyn InverterControl>,
        weather: Arc<dyn WeatherProvider>,
        config: WeatherConfig,
    ) -> Self {
        info!(
            "Weather state machine initialized | cloudy {}, thunderstorm {}, outage window {}h",
            config.cloudy, config.thunderstorm, config.thunderstorm_hour_window
        );
        Self {
            control,
            weather,
            config,
            backup_by_automation: Mutex::new(false),
        }
    }

    pub fn trigger() -> Trigger {
        Trigger::hourly_at(2)
    }

    pub async fn backup_by_automation(&self) -> bool {
        *self.backup_by_automation.lock().await
    }

    /// Pick the evaluation for the hour of `now`
    pub fn plan(&self, now: NaiveDateTime) -> WeatherCheck {
        let hour = now.hour();
        if hour == self.config.morning.hour {
            return self.weather_check(now, &self.config.morning);
        }
        if hour == self.config.noon.hour {
            return self.weather_check(now, &self.config.noon);
        }
        self.outage_check(now)
    }

    fn weather_check(&self, now: NaiveDateTime, check: &ForecastCheck) -> WeatherCheck {
        let at_hour = |hour: u32| {
            now.date()
                .and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN))
        };
        WeatherCheck::Weather {
            start: at_hour(check.window.start_hour),
            end: at_hour(check.window.end_hour),
            threshold: self.config.cloudy + check.threshold_offset,
            min_battery: check.min_battery,
        }
    }

    fn outage_window(&self, now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        let hours = i64::from(self.config.thunderstorm_hour_window);
        (now, now + Duration::hours(hours))
    }

    fn outage_check(&self, now: NaiveDateTime) -> WeatherCheck {
        let (start, end) = self.outage_window(now);
        WeatherCheck::Outage { start, end }
    }

    pub async fn tick(&self, now: NaiveDateTime) -> TickOutcome {
        let check = self.plan(now);
        match check {
            WeatherCheck::Weather { .. } => separator("Weather forecast check"),
            WeatherCheck::Outage { .. } => separator("Outage/thunderstorm forecast check"),
        }
        if DC_POWER_HOURS.contains(&now.hour()) {
            self.log_dc_power().await;
        }
        self.run(now, check).await
    }

    /// PV string power, for the log only
    async fn log_dc_power(&self) {
        match self.control.read_dc_power().await {
            Some([pv1, pv2]) => debug!(
                "- DC power: PV1 {pv1} W, PV2 {pv2} W, total {} W",
                pv1.saturating_add(pv2)
            ),
            None => debug!("- DC power not available"),
        }
    }

    pub async fn run(&self, now: NaiveDateTime, check: WeatherCheck) -> TickOutcome {
        match check {
            WeatherCheck::Weather {
                start,
                end,
                threshold,
                min_battery,
            } => {
                let Some(snapshot) = self.snapshot(start, end).await else {
                    return TickOutcome::Unavailable;
                };
                info!("- Computed avg quality: {:.2} (required: {threshold})", snapshot.avg_quality);
                let transition = self.on_weather(&snapshot, threshold, min_battery);
                if transition == Transition::DelegateToOutage {
                    debug!("Thunderstorm-quality window; delegating to outage check");
                    let (start, end) = self.outage_window(now);
                    return self.run_outage(start, end).await;
                }
                self.apply(snapshot.mode, transition).await
            }
            WeatherCheck::Outage { start, end } => self.run_outage(start, end).await,
        }
    }

    async fn run_outage(&self, start: NaiveDateTime, end: NaiveDateTime) -> TickOutcome {
        let mut backup_by_automation = self.backup_by_automation.lock().await;
        let Some(snapshot) = self.snapshot(start, end).await else {
            return TickOutcome::Unavailable;
        };
        info!(
            "- Computed avg quality: {:.2} (required: {})",
            snapshot.avg_quality, self.config.thunderstorm
        );

        let transition = self.on_outage(&snapshot, *backup_by_automation);
        let outcome = self.apply(snapshot.mode, transition).await;
        if outcome == TickOutcome::Applied {
            *backup_by_automation = snapshot.mode != InverterMode::Backup;
        }
        outcome
    }

    async fn snapshot(&self, start: NaiveDateTime, end: NaiveDateTime) -> Option<Snapshot> {
        let Some(forecast) = self.weather.current_forecast().await else {
            warn!("⚠️ Weather forecast not available; aborting check");
            return None;
        };
        let Some(battery) = self.control.read_battery_percent().await else {
            warn!("⚠️ Battery level not available; aborting check");
            return None;
        };
        let Some(mode) = self.control.read_mode().await else {
            warn!("⚠️ Current inverter mode not available; aborting check");
            return None;
        };

        let first = truncate_hour(start);
        let last = truncate_hour(end);
        let hours: Vec<HourlySample> = forecast
            .into_iter()
            .filter(|s| (first..=last).contains(&s.hour_start()))
            .collect();

        let Some(avg_quality) = average(&hours) else {
            info!("- No forecast hours in window {start} - {end}; aborting check");
            return None;
        };

        info!("- Window: {start} - {end}");
        for hour in &hours {
            debug!("  | {} quality {:.2}", hour.timestamp, hour.value);
        }
        info!("- Battery: {battery}%");
        info!("- Current inverter mode: {mode}");

        Some(Snapshot {
            mode,
            battery,
            hours,
            avg_quality,
        })
    }

    fn on_weather(&self, snapshot: &Snapshot, threshold: f64, min_battery: u8) -> Transition {
        if snapshot.avg_quality >= self.config.thunderstorm {
            return Transition::DelegateToOutage;
        }

        match snapshot.mode {
            InverterMode::FeedInPriority if snapshot.avg_quality >= threshold => {
                info!("Cloudy conditions detected -> SELF_USE");
                Transition::Switch(InverterMode::SelfUse)
            }
            InverterMode::SelfUse if snapshot.avg_quality < threshold => {
                if snapshot.battery >= min_battery {
                    info!("Sunny & battery >= {min_battery}% -> FEED_IN_PRIORITY");
                    Transition::Switch(InverterMode::FeedInPriority)
                } else {
                    info!(
                        "Sunny but battery {}% < {min_battery}% -> staying in SELF_USE",
                        snapshot.battery
                    );
                    Transition::Stay
                }
            }
            InverterMode::FeedInPriority | InverterMode::SelfUse => Transition::Stay,
            InverterMode::Backup | InverterMode::Manual => Transition::Unsupported,
        }
    }

    fn on_outage(&self, snapshot: &Snapshot, backup_by_automation: bool) -> Transition {
        let severe = self.config.thunderstorm;

        if snapshot.mode == InverterMode::Backup && !backup_by_automation {
            return Transition::ManualOverride;
        }

        if snapshot.avg_quality > severe && snapshot.mode != InverterMode::Backup {
            info!("Thunderstorm-quality detected -> BACKUP");
            return Transition::Switch(InverterMode::Backup);
        }

        if snapshot.avg_quality <= severe && snapshot.mode == InverterMode::Backup {
            let nearest = snapshot.hours.first().map_or(0.0, |h| h.value);
            if nearest > severe - self.config.backup_exit_buffer {
                info!("Quality trending down but still elevated ({nearest:.2}); waiting for next hour");
                return Transition::Stay;
            }
            info!("No thunderstorm detected -> SELF_USE");
            return Transition::Switch(InverterMode::SelfUse);
        }

        Transition::Stay
    }

    async fn apply(&self, current: InverterMode, transition: Transition) -> TickOutcome {
        match transition {
            Transition::Switch(target) if target != current => {
                apply_mode(self.control.as_ref(), target).await
            }
            Transition::Switch(_) | Transition::Stay => {
                info!("No change needed");
                TickOutcome::NoChange
            }
            Transition::ManualOverride => {
                warn!("⚠️ BACKUP mode was set manually; skipping automation this cycle");
                TickOutcome::Skipped
            }
            Transition::Unsupported => {
                warn!("⚠️ Unsupported mode for weather check: {current}; no action");
                TickOutcome::Skipped
            }
            Transition::DelegateToOutage => TickOutcome::Skipped,
        }
    }
}

fn truncate_hour(t: NaiveDateTime) -> NaiveDateTime {
    t.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}
