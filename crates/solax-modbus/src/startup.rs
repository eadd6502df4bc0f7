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

use crate::config::{InverterConfig, SafetyConfig};
use crate::facade::SolaxDevice;
use crate::governor::{FatalShutdown, SafetyGovernor};
use crate::link::Link;
use crate::queue::{QueueTiming, RequestQueue};
use crate::transport::TcpTransport;
use anyhow::{Context, Result, bail};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Build the TCP link, queue worker, governor and facade.
pub fn open_device(
    inverter: &InverterConfig,
    safety: &SafetyConfig,
    shutdown: Arc<dyn FatalShutdown>,
) -> (SolaxDevice, JoinHandle<()>) {
    info!(
        "Initializing Solax client with host: {} and port: {}",
        inverter.host, inverter.port
    );

    let transport = TcpTransport::new(
        inverter.host.clone(),
        inverter.port,
        inverter.unit_id,
        inverter.io_timeout(),
    );
    let timing = QueueTiming {
        delay: inverter.request_delay(),
        idle_timeout: inverter.idle_timeout(),
        watchdog_tick: inverter.watchdog_tick(),
    };
    let (queue, worker) = RequestQueue::spawn(Link::new(Box::new(transport)), timing);
    let governor = Arc::new(SafetyGovernor::new(safety, shutdown));

    (SolaxDevice::new(queue, governor), worker)
}

/// Identify the inverter and unlock it if needed.
///
/// Returns the serial number.
pub async fn handshake(device: &SolaxDevice, password: i32) -> Result<String> {
    let serial = device
        .read_serial_number()
        .await
        .context("Unable to read inverter serial number")?;
    info!("- Inverter serial number: {serial}");

    let lock_state = device
        .read_lock_state()
        .await
        .context("Unable to read inverter lock state")?;

    if lock_state == 0 {
        info!("Inverter is locked, unlocking...");
        if !device.unlock(password).await {
            bail!("Failed to unlock inverter {serial}");
        }
        info!("✅ Inverter unlocked successfully");
    } else {
        info!("Inverter is already unlocked");
    }

    match device.read_power_control().await {
        Some(true) => info!("- Modbus power control: enabled"),
        Some(false) => warn!("⚠️ Modbus power control is disabled on the inverter"),
        None => warn!("⚠️ Modbus power control state unknown"),
    }
    if let Some((soc, soh)) = device.read_bms_state().await {
        info!("- BMS: {soc}% charged, {soh}% health");
    }

    Ok(serial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModbusError;
    use crate::governor::tests::CountingShutdown;
    use crate::link::tests::ScriptedTransport;
    use crate::transport::Operation;
    use std::time::Duration;

    fn device(transport: &ScriptedTransport) -> SolaxDevice {
        let timing = QueueTiming {
            delay: Duration::from_millis(100),
            idle_timeout: Duration::from_secs(60),
            watchdog_tick: Duration::from_secs(1),
        };
        let (queue, _worker) = RequestQueue::spawn(Link::new(Box::new(transport.clone())), timing);
        let governor = Arc::new(SafetyGovernor::new(
            &SafetyConfig::default(),
            Arc::new(CountingShutdown::default()),
        ));
        SolaxDevice::new(queue, governor)
    }

    fn serial_words() -> Vec<u16> {
        vec![0x4833, 0x3441, 0x3130, 0x4931, 0x3233, 0x3435, 0x3637]
    }

    #[tokio::test(start_paused = true)]
    async fn test_locked_inverter_is_unlocked() {
        let transport = ScriptedTransport::default();
        transport.respond(Ok(serial_words()));
        transport.respond(Ok(vec![0]));
        let device = device(&transport);

        let serial = handshake(&device, 2014).await.unwrap();

        assert_eq!(serial, "H34A10I1234567");
        assert!(transport.script.lock().calls.contains(&Operation::WriteSingle {
            address: 0x0000,
            value: 2014
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlocked_inverter_gets_no_password() {
        let transport = ScriptedTransport::default();
        transport.respond(Ok(serial_words()));
        transport.respond(Ok(vec![1]));
        let device = device(&transport);

        handshake(&device, 2014).await.unwrap();

        assert!(!transport.script.lock().calls.iter().any(Operation::is_write));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_serial_aborts_startup() {
        let transport = ScriptedTransport::default();
        transport.respond(Err(ModbusError::Timeout(Duration::from_secs(5))));
        let device = device(&transport);

        let err = handshake(&device, 2014).await.unwrap_err();
        assert!(err.to_string().contains("serial number"));
    }
}
