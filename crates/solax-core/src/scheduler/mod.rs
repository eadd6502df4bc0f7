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

//! Decision schedulers
//!
//! Every tick follows the same contract: read everything it needs, abort
//! with a log entry if any input is missing, compute the target, write only
//! when the target differs from what the device reports, and never retry
//! inside the tick. The next tick is the retry path.

pub mod battery_guard;
pub mod export_limiter;
pub mod price_armer;
pub mod runner;
pub mod weather;

pub use battery_guard::BatteryGuard;
pub use export_limiter::{ExportCeiling, ExportLimiter};
pub use price_armer::{ArmOutcome, ArmedTrigger, PriceArmer};
pub use runner::spawn_schedule;
pub use weather::{WeatherCheck, WeatherStateMachine};

use crate::traits::InverterControl;
use solax_types::InverterMode;
use tracing::{error, info};

/// Result of a single scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A required input could not be read; nothing was written
    Unavailable,
    /// The current state is outside this scheduler's remit
    Skipped,
    /// Device already matches the target
    NoChange,
    /// A write was issued and acknowledged
    Applied,
    /// A write was issued and failed
    WriteFailed,
}

pub(crate) fn separator(title: &str) {
    info!("{}", "==".repeat(40));
    info!("{title}");
}

pub(crate) async fn apply_mode(control: &dyn InverterControl, mode: InverterMode) -> TickOutcome {
    if control.write_mode(mode).await {
        info!("✅ Inverter mode set to {mode}");
        TickOutcome::Applied
    } else {
        error!("❌ Failed to set inverter mode to {mode}");
        TickOutcome::WriteFailed
    }
}
