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

//! Per-scheduler thresholds and windows
//!
//! All values are static deployment configuration. Defaults follow the
//! values the plant has been running with.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Half-open hour range `start_hour..end_hour` in local time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl HourWindow {
    pub const fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.start_hour && hour < self.end_hour
    }
}

// ============= Battery guard =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourThreshold {
    pub hour: u32,
    pub min_percent: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatteryGuardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum battery level required at the given hour
    #[serde(default = "default_battery_thresholds")]
    pub thresholds: Vec<HourThreshold>,

    /// Added to every threshold on Saturday and Sunday (capped at 100 %)
    #[serde(default = "default_week_increase")]
    pub week_increase: u8,
}

fn default_battery_thresholds() -> Vec<HourThreshold> {
    vec![
        HourThreshold {
            hour: 6,
            min_percent: 20,
        },
        HourThreshold {
            hour: 9,
            min_percent: 40,
        },
        HourThreshold {
            hour: 12,
            min_percent: 60,
        },
        HourThreshold {
            hour: 15,
            min_percent: 80,
        },
    ]
}

fn default_week_increase() -> u8 {
    10
}

impl Default for BatteryGuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            thresholds: default_battery_thresholds(),
            week_increase: default_week_increase(),
        }
    }
}

// ============= Price-driven discharge =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DischargeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Best hour must reach this price (CZK/kWh) to arm a discharge
    #[serde(default = "default_discharge_min_price")]
    pub min_price: f64,

    /// Battery level required to start, and below which the evening guard stops a discharge
    #[serde(default = "default_discharge_min_battery")]
    pub min_battery: u8,

    #[serde(default = "default_discharge_window")]
    pub window: HourWindow,

    #[serde(default = "default_arm_hour")]
    pub arm_hour: u32,

    #[serde(default)]
    pub arm_minute: u32,

    #[serde(default = "default_early_start_minutes")]
    pub early_start_minutes: i64,

    #[serde(default = "default_price_continuity_delta")]
    pub price_continuity_delta: f64,

    #[serde(default = "default_guard_start_hour")]
    pub guard_start_hour: u32,

    #[serde(default = "default_guard_end_hour")]
    pub guard_end_hour: u32,
}

fn default_discharge_min_price() -> f64 {
    2.5
}

fn default_discharge_min_battery() -> u8 {
    80
}

fn default_discharge_window() -> HourWindow {
    HourWindow::new(18, 22)
}

fn default_arm_hour() -> u32 {
    16
}

fn default_early_start_minutes() -> i64 {
    30
}

fn default_price_continuity_delta() -> f64 {
    0.2
}

fn default_guard_start_hour() -> u32 {
    18
}

fn default_guard_end_hour() -> u32 {
    23
}

impl Default for DischargeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_price: default_discharge_min_price(),
            min_battery: default_discharge_min_battery(),
            window: default_discharge_window(),
            arm_hour: default_arm_hour(),
            arm_minute: 0,
            early_start_minutes: default_early_start_minutes(),
            price_continuity_delta: default_price_continuity_delta(),
            guard_start_hour: default_guard_start_hour(),
            guard_end_hour: default_guard_end_hour(),
        }
    }
}

// ============= Weather =============

/// A scheduled weather check: which hour it runs, which hours it looks at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastCheck {
    pub hour: u32,
    pub window: HourWindow,
    /// Added to the cloudy threshold for this check
    #[serde(default)]
    pub threshold_offset: f64,
    /// Battery level required before switching to FEED_IN_PRIORITY
    pub min_battery: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cloudy")]
    pub cloudy: f64,

    #[serde(default = "default_thunderstorm")]
    pub thunderstorm: f64,

    /// Hours ahead inspected by the outage check
    #[serde(default = "default_thunderstorm_hour_window")]
    pub thunderstorm_hour_window: u32,

    /// BACKUP is kept while the nearest hour scores above `thunderstorm - buffer`
    #[serde(default = "default_backup_exit_buffer")]
    pub backup_exit_buffer: f64,

    #[serde(default = "default_morning_check")]
    pub morning: ForecastCheck,

    #[serde(default = "default_noon_check")]
    pub noon: ForecastCheck,
}

fn default_cloudy() -> f64 {
    5.0
}

fn default_thunderstorm() -> f64 {
    10.0
}

fn default_thunderstorm_hour_window() -> u32 {
    2
}

fn default_backup_exit_buffer() -> f64 {
    1.5
}

fn default_morning_check() -> ForecastCheck {
    ForecastCheck {
        hour: 7,
        window: HourWindow::new(9, 14),
        threshold_offset: 0.0,
        min_battery: 10,
    }
}

fn default_noon_check() -> ForecastCheck {
    ForecastCheck {
        hour: 11,
        window: HourWindow::new(12, 16),
        threshold_offset: -0.5,
        min_battery: 50,
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cloudy: default_cloudy(),
            thunderstorm: default_thunderstorm(),
            thunderstorm_hour_window: default_thunderstorm_hour_window(),
            backup_exit_buffer: default_backup_exit_buffer(),
            morning: default_morning_check(),
            noon: default_noon_check(),
        }
    }
}

// ============= Export limit =============

/// Export ceilings in watts; the device only holds multiples of 10 W
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPower {
    pub min: u32,
    pub max: u32,
    pub reduced: u32,
}

impl Default for ExportPower {
    fn default() -> Self {
        Self {
            min: 100,
            max: 3950,
            reduced: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub power: ExportPower,

    /// Below this price (CZK/kWh) a grid-connected plant limits export to `power.min`
    #[serde(default = "default_export_min_price")]
    pub min_price: f64,

    #[serde(default = "default_reduced_window")]
    pub reduced_window: HourWindow,

    /// Forecast quality at or below this value enables the reduced ceiling
    #[serde(default = "default_reduced_quality_threshold")]
    pub reduced_quality_threshold: f64,

    /// Sensor events and scheduled checks outside these hours are ignored
    #[serde(default = "default_active_start_hour")]
    pub active_start_hour: u32,

    #[serde(default = "default_active_end_hour")]
    pub active_end_hour: u32,
}

fn default_export_min_price() -> f64 {
    0.5
}

fn default_reduced_window() -> HourWindow {
    HourWindow::new(12, 14)
}

fn default_reduced_quality_threshold() -> f64 {
    3.0
}

fn default_active_start_hour() -> u32 {
    4
}

fn default_active_end_hour() -> u32 {
    20
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            power: ExportPower::default(),
            min_price: default_export_min_price(),
            reduced_window: default_reduced_window(),
            reduced_quality_threshold: default_reduced_quality_threshold(),
            active_start_hour: default_active_start_hour(),
            active_end_hour: default_active_end_hour(),
        }
    }
}

impl ExportConfig {
    pub fn is_active_hour(&self, hour: u32) -> bool {
        (self.active_start_hour..=self.active_end_hour).contains(&hour)
    }
}
