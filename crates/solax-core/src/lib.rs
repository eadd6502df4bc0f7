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

//! Decision engine: collaborator traits, wall-clock triggers and the
//! schedulers that turn battery, price, weather and grid signals into
//! inverter mode and export-limit changes.

pub mod clock;
pub mod config;
pub mod scheduler;
pub mod traits;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, LocalClock};
pub use config::{
    BatteryGuardConfig, DischargeConfig, ExportConfig, ExportPower, ForecastCheck, HourThreshold,
    HourWindow, WeatherConfig,
};
pub use scheduler::{
    ArmOutcome, BatteryGuard, ExportCeiling, ExportLimiter, PriceArmer, TickOutcome,
    WeatherCheck, WeatherStateMachine, spawn_schedule,
};
pub use traits::{ConnectionSensor, InverterControl, PriceProvider, WeatherProvider};
pub use trigger::Trigger;
