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

use thiserror::Error;

/// Largest export ceiling the inverter accepts, in watts
pub const MAX_EXPORT_LIMIT_W: u32 = 10_000;

/// Caller passed an export limit the device cannot represent.
///
/// Raised before anything is queued, so it never counts as a device failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("export limit {watts} W is outside 0..={MAX_EXPORT_LIMIT_W} W")]
pub struct ExportLimitError {
    pub watts: i64,
}

impl ExportLimitError {
    /// Validate `watts` and return it as an unsigned value
    pub fn check(watts: i64) -> Result<u32, Self> {
        u32::try_from(watts)
            .ok()
            .filter(|w| *w <= MAX_EXPORT_LIMIT_W)
            .ok_or(Self { watts })
    }
}
