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

use super::{TickOutcome, apply_mode, separator};
use crate::config::BatteryGuardConfig;
use crate::traits::InverterControl;
use crate::trigger::Trigger;
use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use solax_types::InverterMode;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Stops prioritizing export when the battery falls behind the hourly plan.
///
/// Only ever moves FEED_IN_PRIORITY -> SELF_USE. Switching back is left to
/// the weather scheduler so the two never fight each other.
pub struct BatteryGuard {
    control: Arc<dyn InverterControl>,
    config: BatteryGuardConfig,
}

impl fmt::Debug for BatteryGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatteryGuard")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BatteryGuard {
    pub fn new(control: Arc<dyn InverterControl>, config: BatteryGuardConfig) -> Self {
        for threshold in &config.thresholds {
            info!(
                " - Battery check at {:02}:05 -> {}% (weekend +{}%)",
                threshold.hour, threshold.min_percent, config.week_increase
            );
        }
        Self { control, config }
    }

    pub fn trigger() -> Trigger {
        Trigger::hourly_at(5)
    }

    /// Minimum level for the hour of `now`, `None` when the hour is not configured
    pub fn min_level_for(&self, now: NaiveDateTime) -> Option<u8> {
        let base = self
            .config
            .thresholds
            .iter()
            .find(|t| t.hour == now.hour())?
            .min_percent;

        let bonus = if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
            self.config.week_increase
        } else {
            0
        };

        Some(base.saturating_add(bonus).min(100))
    }

    pub async fn tick(&self, now: NaiveDateTime) -> TickOutcome {
        let Some(min_level) = self.min_level_for(now) else {
            return TickOutcome::Skipped;
        };

        separator("Running scheduled battery level check");
        self.run_check(min_level).await
    }

    pub async fn run_check(&self, min_level: u8) -> TickOutcome {
        let Some(battery) = self.control.read_battery_percent().await else {
            warn!("⚠️ Battery level not available; aborting check");
            return TickOutcome::Unavailable;
        };

        let Some(mode) = self.control.read_mode().await else {
            warn!("⚠️ Current inverter mode not available; aborting check");
            return TickOutcome::Unavailable;
        };

        info!("- Current battery level: {battery}% (required: {min_level}%)");
        info!("- Current inverter mode: {mode}");

        if battery >= min_level {
            info!("Battery level is sufficient; no action needed");
            return TickOutcome::NoChange;
        }

        if !mode.is_automatic() {
            warn!("⚠️ Inverter mode {mode} is not FEED_IN_PRIORITY or SELF_USE; aborting check");
            return TickOutcome::Skipped;
        }

        if mode == InverterMode::SelfUse {
            info!("Battery below {min_level}% but inverter already in SELF_USE; no action needed");
            return TickOutcome::NoChange;
        }

        info!("Battery level below {min_level}%; switching to SELF_USE");
        apply_mode(self.control.as_ref(), InverterMode::SelfUse).await
    }
}
