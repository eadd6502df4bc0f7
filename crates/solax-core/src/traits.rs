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

use async_trait::async_trait;
use solax_types::{ExportLimitError, GridConnection, HourlySample, InverterMode, ManualSubMode};
use tokio::sync::broadcast;

/// Typed inverter operations used by the schedulers
///
/// Transport failures never surface as errors here. A `None` or `false`
/// means "unknown this cycle" and must not be replaced by a default value.
#[async_trait]
pub trait InverterControl: Send + Sync {
    async fn read_mode(&self) -> Option<InverterMode>;

    async fn write_mode(&self, mode: InverterMode) -> bool;

    /// Only meaningful while the inverter is in MANUAL; callers check that.
    async fn write_manual_sub_mode(&self, sub_mode: ManualSubMode) -> bool;

    /// Battery state of charge, 0..=100
    async fn read_battery_percent(&self) -> Option<u8>;

    async fn read_export_limit_watts(&self) -> Option<u32>;

    /// Out-of-range values are rejected before anything reaches the device.
    async fn write_export_limit_watts(&self, watts: i64) -> Result<bool, ExportLimitError>;

    /// DC power of both PV strings in watts
    async fn read_dc_power(&self) -> Option<[u32; 2]>;
}

/// Hourly weather quality forecast source
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current_forecast(&self) -> Option<Vec<HourlySample>>;
}

/// Day-ahead electricity price source (CZK/kWh)
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn current_hour_price(&self) -> Option<f64>;

    async fn forecast(&self) -> Option<Vec<HourlySample>>;
}

/// Grid connection sense line
pub trait ConnectionSensor: Send + Sync {
    fn state(&self) -> GridConnection;

    /// Change events; receivers see every edge after they subscribe
    fn subscribe(&self) -> broadcast::Receiver<GridConnection>;
}
