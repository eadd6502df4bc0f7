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

use crate::codec::CodecError;
use crate::governor::GovernorError;
use std::time::Duration;
use thiserror::Error;

/// Modbus layer error types
#[derive(Error, Debug)]
pub enum ModbusError {
    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Modbus I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Device returned exception: {0}")]
    Exception(String),

    #[error("Response decoding failed: {0}")]
    Decode(#[from] CodecError),

    #[error("Request queue is closed")]
    QueueClosed,

    #[error("Safety governor halted device access: {0}")]
    Governor(#[from] GovernorError),
}

impl ModbusError {
    /// Errors after which the TCP session should not be reused
    pub fn breaks_session(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout(_) | Self::Connect { .. })
    }
}

pub type Result<T> = std::result::Result<T, ModbusError>;
