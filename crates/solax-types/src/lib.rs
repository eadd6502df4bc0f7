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

//! Shared domain types for Solax automation.

pub mod connection;
pub mod error;
pub mod mode;
pub mod sample;
pub mod weather;

pub use connection::{ConnectionSignal, GridConnection};
pub use error::ExportLimitError;
pub use mode::{InverterMode, ManualSubMode, WireEnum};
pub use sample::{HourlySample, average};
pub use weather::WeatherType;
