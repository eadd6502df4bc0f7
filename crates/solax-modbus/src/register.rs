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

//! Solax X1/X3 Modbus register map
//!
//! Solax keeps its writable settings in a separate address space from the
//! holding registers it reports them in, so the same setting usually has a
//! read address and a different write address.

use crate::codec::{RegisterValue, ValueKind};
use solax_types::{InverterMode, ManualSubMode};
use std::fmt;
use std::marker::PhantomData;

/// Address space a register lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterKind {
    /// Read-only input region (function code 04)
    Input,
    /// Holding region, read side (function code 03)
    Holding,
    /// Holding region, write side (function codes 06 / 16)
    Write,
}

/// Untyped view of a register, used for logging and catalog checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDescriptor {
    pub name: &'static str,
    pub address: u16,
    pub count: u16,
    pub kind: RegisterKind,
    pub value: ValueKind,
}

impl fmt::Display for RegisterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' @0x{:04X} x{}", self.name, self.address, self.count)
    }
}

/// Register whose words decode to `T`
#[derive(Debug)]
pub struct Register<T> {
    pub name: &'static str,
    pub address: u16,
    pub count: u16,
    pub kind: RegisterKind,
    _value: PhantomData<fn() -> T>,
}

impl<T: RegisterValue> Register<T> {
    pub const fn new(name: &'static str, address: u16, count: u16, kind: RegisterKind) -> Self {
        Self {
            name,
            address,
            count,
            kind,
            _value: PhantomData,
        }
    }

    pub fn descriptor(&self) -> RegisterDescriptor {
        RegisterDescriptor {
            name: self.name,
            address: self.address,
            count: self.count,
            kind: self.kind,
            value: T::KIND,
        }
    }
}

// Read side
pub const INVERTER_SN: Register<String> =
    Register::new("InverterSN", 0x0000, 7, RegisterKind::Holding);
pub const EXPORT_LIMIT: Register<i32> =
    Register::new("ExportLimit", 0x00B6, 1, RegisterKind::Holding);
pub const USE_MODE: Register<InverterMode> =
    Register::new("SolarChargerUseMode", 0x008B, 1, RegisterKind::Holding);
pub const POWER_DC: Register<[u16; 2]> = Register::new("PowerDC", 0x000A, 2, RegisterKind::Input);
pub const BATTERY_CAPACITY: Register<i32> =
    Register::new("BatteryCapacity", 0x001C, 1, RegisterKind::Input);
pub const LOCK_STATE: Register<i32> = Register::new("LockState", 0x0054, 1, RegisterKind::Input);
pub const POWER_CONTROL: Register<bool> =
    Register::new("ModbusPowerControl", 0x0100, 1, RegisterKind::Input);
pub const BMS_USER_SOC: Register<i32> =
    Register::new("BMS_UserSOC", 0x00BE, 1, RegisterKind::Input);
pub const BMS_USER_SOH: Register<i32> =
    Register::new("BMS_UserSOH", 0x00BF, 1, RegisterKind::Input);

// Write side
pub const UNLOCK_PASSWORD: Register<i32> =
    Register::new("UnlockPassword", 0x0000, 1, RegisterKind::Write);
pub const WRITE_USE_MODE: Register<InverterMode> =
    Register::new("SolarChargerUseMode", 0x001F, 1, RegisterKind::Write);
pub const WRITE_MANUAL_MODE: Register<ManualSubMode> =
    Register::new("ManualMode", 0x0020, 1, RegisterKind::Write);
pub const WRITE_EXPORT_LIMIT: Register<i32> =
    Register::new("ExportLimit", 0x0042, 1, RegisterKind::Write);

/// Every register the automation touches
pub fn catalog() -> [RegisterDescriptor; 13] {
    [
        INVERTER_SN.descriptor(),
        EXPORT_LIMIT.descriptor(),
        USE_MODE.descriptor(),
        POWER_DC.descriptor(),
        BATTERY_CAPACITY.descriptor(),
        LOCK_STATE.descriptor(),
        POWER_CONTROL.descriptor(),
        BMS_USER_SOC.descriptor(),
        BMS_USER_SOH.descriptor(),
        UNLOCK_PASSWORD.descriptor(),
        WRITE_USE_MODE.descriptor(),
        WRITE_MANUAL_MODE.descriptor(),
        WRITE_EXPORT_LIMIT.descriptor(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_address_and_kind_are_unique() {
        let mut seen = HashSet::new();
        for register in catalog() {
            assert!(
                seen.insert((register.address, register.kind)),
                "duplicate register {register}"
            );
        }
    }

    #[test]
    fn test_word_counts_match_value_kind() {
        for register in catalog() {
            match register.value {
                ValueKind::Text => assert!(register.count >= 1, "{register}"),
                ValueKind::Pair => assert_eq!(register.count, 2, "{register}"),
                ValueKind::Int | ValueKind::Bool | ValueKind::Enum(_) => {
                    assert_eq!(register.count, 1, "{register}");
                }
            }
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(USE_MODE.descriptor().to_string(), "'SolarChargerUseMode' @0x008B x1");
    }
}
