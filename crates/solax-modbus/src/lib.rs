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

//! Solax inverter access over Modbus TCP.
//!
//! The only public entry point for device I/O is [`SolaxDevice`]. It sends
//! every request through a single [`RequestQueue`] worker, which owns the
//! [`Link`] exclusively, and reports outcomes to the [`SafetyGovernor`].

pub mod codec;
pub mod config;
pub mod error;
pub mod facade;
pub mod governor;
pub mod link;
pub mod queue;
pub mod register;
pub mod startup;
pub mod transport;

pub use codec::{CodecError, RegisterValue, ValueKind};
pub use config::{InverterConfig, SafetyConfig};
pub use error::{ModbusError, Result};
pub use facade::SolaxDevice;
pub use governor::{FatalShutdown, GovernorError, ProcessShutdown, SafetyGovernor};
pub use link::{Link, LinkSession};
pub use queue::{QueueTiming, RequestQueue};
pub use register::{Register, RegisterDescriptor, RegisterKind};
pub use startup::{handshake, open_device};
pub use transport::{Operation, TcpTransport, Transport};
