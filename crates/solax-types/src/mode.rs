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

use serde::{Deserialize, Serialize};
use std::fmt;

/// Enumeration transported over the wire as a zero-based ordinal in one register word.
///
/// `ORDINALS` is the single source of truth for the encoding. Entries are listed
/// in ordinal order and must never be reordered: the inverter interprets the raw
/// number, not the Rust variant.
pub trait WireEnum: Sized + Copy + PartialEq + fmt::Debug + 'static {
    /// Type name used in decode errors
    const NAME: &'static str;

    /// Declared `(ordinal, variant)` table
    const ORDINALS: &'static [(u16, Self)];

    fn ordinal(self) -> u16 {
        Self::ORDINALS
            .iter()
            .find(|(_, variant)| *variant == self)
            .map_or(u16::MAX, |(ordinal, _)| *ordinal)
    }

    fn from_ordinal(ordinal: u16) -> Option<Self> {
        Self::ORDINALS
            .iter()
            .find(|(value, _)| *value == ordinal)
            .map(|(_, variant)| *variant)
    }
}

/// Solax charger use mode (top-level operating strategy)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InverterMode {
    /// Self-consumption first, surplus to grid
    SelfUse,
    /// Export to grid takes priority over charging
    FeedInPriority,
    /// Battery held in reserve for grid outages
    Backup,
    /// Charging controlled by [`ManualSubMode`]
    Manual,
}

impl WireEnum for InverterMode {
    const NAME: &'static str = "InverterMode";
    const ORDINALS: &'static [(u16, Self)] = &[
        (0, Self::SelfUse),
        (1, Self::FeedInPriority),
        (2, Self::Backup),
        (3, Self::Manual),
    ];
}

impl InverterMode {
    /// Modes the weather and battery automation is allowed to switch between
    pub fn is_automatic(self) -> bool {
        matches!(self, Self::SelfUse | Self::FeedInPriority)
    }
}

impl fmt::Display for InverterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SelfUse => "SELF_USE",
            Self::FeedInPriority => "FEED_IN_PRIORITY",
            Self::Backup => "BACKUP",
            Self::Manual => "MANUAL",
        };
        f.write_str(name)
    }
}

/// Secondary selector, only meaningful while the inverter is in [`InverterMode::Manual`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManualSubMode {
    StopChargeAndDischarge,
    ForceCharge,
    ForceDischarge,
}

impl WireEnum for ManualSubMode {
    const NAME: &'static str = "ManualSubMode";
    const ORDINALS: &'static [(u16, Self)] = &[
        (0, Self::StopChargeAndDischarge),
        (1, Self::ForceCharge),
        (2, Self::ForceDischarge),
    ];
}

impl fmt::Display for ManualSubMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StopChargeAndDischarge => "STOP_CHARGE_AND_DISCHARGE",
            Self::ForceCharge => "FORCE_CHARGE",
            Self::ForceDischarge => "FORCE_DISCHARGE",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverter_mode_ordinals_are_stable() {
        // Wire values; changing any of these changes device behavior
        assert_eq!(InverterMode::SelfUse.ordinal(), 0);
        assert_eq!(InverterMode::FeedInPriority.ordinal(), 1);
        assert_eq!(InverterMode::Backup.ordinal(), 2);
        assert_eq!(InverterMode::Manual.ordinal(), 3);
    }

    #[test]
    fn test_manual_sub_mode_ordinals_are_stable() {
        assert_eq!(ManualSubMode::StopChargeAndDischarge.ordinal(), 0);
        assert_eq!(ManualSubMode::ForceCharge.ordinal(), 1);
        assert_eq!(ManualSubMode::ForceDischarge.ordinal(), 2);
    }

    #[test]
    fn test_ordinal_tables_are_dense_and_unique() {
        fn check<T: WireEnum>() {
            for (index, (ordinal, variant)) in T::ORDINALS.iter().enumerate() {
                assert_eq!(usize::from(*ordinal), index, "{} table has a gap", T::NAME);
                assert_eq!(T::from_ordinal(*ordinal), Some(*variant));
            }
        }
        check::<InverterMode>();
        check::<ManualSubMode>();
    }

    #[test]
    fn test_from_ordinal_out_of_range() {
        assert_eq!(InverterMode::from_ordinal(4), None);
        assert_eq!(ManualSubMode::from_ordinal(3), None);
        assert_eq!(InverterMode::from_ordinal(u16::MAX), None);
    }

    #[test]
    fn test_is_automatic() {
        assert!(InverterMode::SelfUse.is_automatic());
        assert!(InverterMode::FeedInPriority.is_automatic());
        assert!(!InverterMode::Backup.is_automatic());
        assert!(!InverterMode::Manual.is_automatic());
    }

    #[test]
    fn test_mode_serde() {
        let json = serde_json::to_string(&InverterMode::FeedInPriority).unwrap();
        assert_eq!(json, "\"FEED_IN_PRIORITY\"");

        let mode: ManualSubMode = serde_json::from_str("\"FORCE_DISCHARGE\"").unwrap();
        assert_eq!(mode, ManualSubMode::ForceDischarge);
    }
}
