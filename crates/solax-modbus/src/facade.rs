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

use crate::codec::RegisterValue;
use crate::error::{ModbusError, Result};
use crate::governor::SafetyGovernor;
use crate::queue::RequestQueue;
use crate::register::{self, Register, RegisterKind};
use crate::transport::Operation;
use async_trait::async_trait;
use solax_core::InverterControl;
use solax_types::{ExportLimitError, InverterMode, ManualSubMode};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Export limit register unit
const EXPORT_LIMIT_STEP_W: u32 = 10;

/// Typed access to a Solax inverter.
///
/// Every call goes through the shared [`RequestQueue`] and reports to the
/// [`SafetyGovernor`]. Transport problems are logged and come back as
/// `None` / `false`.
#[derive(Debug, Clone)]
pub struct SolaxDevice {
    queue: RequestQueue,
    governor: Arc<SafetyGovernor>,
}

impl SolaxDevice {
    pub fn new(queue: RequestQueue, governor: Arc<SafetyGovernor>) -> Self {
        Self { queue, governor }
    }

    pub fn governor(&self) -> &Arc<SafetyGovernor> {
        &self.governor
    }

    /// Drain the queue and drop the connection
    pub async fn close(&self) {
        self.queue.close().await;
    }

    pub async fn read<T: RegisterValue>(&self, register: &Register<T>) -> Option<T> {
        let descriptor = register.descriptor();
        debug!("Reading {descriptor}");

        match self.try_read(register).await {
            Ok(value) => {
                self.governor.record_success();
                Some(value)
            }
            Err(ModbusError::Governor(e)) => {
                warn!("Skipping read of {descriptor}: {e}");
                None
            }
            Err(e) => {
                error!("❌ Failed reading {descriptor}: {e}");
                let _ = self.governor.record_failure();
                None
            }
        }
    }

    async fn try_read<T: RegisterValue>(&self, register: &Register<T>) -> Result<T> {
        self.governor.check()?;

        let address = register.address;
        let count = register.count;
        let operation = match register.kind {
            RegisterKind::Input => Operation::ReadInput { address, count },
            RegisterKind::Holding | RegisterKind::Write => Operation::ReadHolding { address, count },
        };

        let words = self.queue.submit(operation).await?;
        Ok(T::decode(&words)?)
    }

    pub async fn write<T: RegisterValue>(&self, register: &Register<T>, value: &T) -> bool {
        let descriptor = register.descriptor();
        debug!("Writing {descriptor}");

        if let Err(e) = self.governor.record_write() {
            error!("❌ Refusing write to {descriptor}: {e}");
            return false;
        }

        let words = value.encode(register.count);
        let operation = if let [value] = words[..] {
            Operation::WriteSingle {
                address: register.address,
                value,
            }
        } else {
            Operation::WriteMultiple {
                address: register.address,
                values: words,
            }
        };

        match self.queue.submit(operation).await {
            Ok(_) => {
                self.governor.record_success();
                true
            }
            Err(e) => {
                error!("❌ Failed to write {descriptor}: {e}");
                let _ = self.governor.record_failure();
                false
            }
        }
    }

    pub async fn read_serial_number(&self) -> Option<String> {
        self.read(&register::INVERTER_SN).await
    }

    /// 0 means locked
    pub async fn read_lock_state(&self) -> Option<i32> {
        self.read(&register::LOCK_STATE).await
    }

    pub async fn unlock(&self, password: i32) -> bool {
        self.write(&register::UNLOCK_PASSWORD, &password).await
    }

    /// Whether remote power control over Modbus is enabled
    pub async fn read_power_control(&self) -> Option<bool> {
        self.read(&register::POWER_CONTROL).await
    }

    /// BMS state of charge and state of health, in percent
    pub async fn read_bms_state(&self) -> Option<(i32, i32)> {
        let soc = self.read(&register::BMS_USER_SOC).await?;
        let soh = self.read(&register::BMS_USER_SOH).await?;
        Some((soc, soh))
    }
}

#[async_trait]
impl InverterControl for SolaxDevice {
    async fn read_mode(&self) -> Option<InverterMode> {
        self.read(&register::USE_MODE).await
    }

    async fn write_mode(&self, mode: InverterMode) -> bool {
        debug!("Requesting inverter mode {mode}");
        self.write(&register::WRITE_USE_MODE, &mode).await
    }

    async fn write_manual_sub_mode(&self, sub_mode: ManualSubMode) -> bool {
        debug!("Requesting manual mode {sub_mode:?}");
        self.write(&register::WRITE_MANUAL_MODE, &sub_mode).await
    }

    async fn read_battery_percent(&self) -> Option<u8> {
        let raw = self.read(&register::BATTERY_CAPACITY).await?;
        match u8::try_from(raw) {
            Ok(percent) if percent <= 100 => Some(percent),
            Ok(_) | Err(_) => {
                warn!("⚠️ Battery capacity {raw} is outside 0..=100; ignoring");
                None
            }
        }
    }

    async fn read_export_limit_watts(&self) -> Option<u32> {
        let raw = self.read(&register::EXPORT_LIMIT).await?;
        match u32::try_from(raw) {
            Ok(steps) => Some(steps * EXPORT_LIMIT_STEP_W),
            Err(_) => {
                warn!("⚠️ Export limit register holds negative value {raw}; ignoring");
                None
            }
        }
    }

    async fn write_export_limit_watts(
        &self,
        watts: i64,
    ) -> std::result::Result<bool, ExportLimitError> {
        let watts = ExportLimitError::check(watts).inspect_err(|e| error!("❌ {e}"))?;
        #[expect(clippy::integer_division, reason = "device stores 10 W steps")]
        let steps = watts / EXPORT_LIMIT_STEP_W;
        let steps = i32::try_from(steps).map_err(|_| ExportLimitError {
            watts: i64::from(watts),
        })?;
        Ok(self.write(&register::WRITE_EXPORT_LIMIT, &steps).await)
    }

    async fn read_dc_power(&self) -> Option<[u32; 2]> {
        let [a, b] = self.read(&register::POWER_DC).await?;
        Some([u32::from(a), u32::from(b)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SafetyConfig;
    use crate::governor::tests::CountingShutdown;
    use crate::link::Link;
    use crate::link::tests::ScriptedTransport;
    use crate::queue::QueueTiming;
    use std::time::Duration;

    struct Fixture {
        transport: ScriptedTransport,
        shutdown: Arc<CountingShutdown>,
        device: SolaxDevice,
    }

    fn fixture() -> Fixture {
        let transport = ScriptedTransport::default();
        let timing = QueueTiming {
            delay: Duration::from_millis(100),
            idle_timeout: Duration::from_secs(60),
            watchdog_tick: Duration::from_secs(1),
        };
        let (queue, _worker) = RequestQueue::spawn(Link::new(Box::new(transport.clone())), timing);
        let shutdown = Arc::new(CountingShutdown::default());
        let governor = Arc::new(SafetyGovernor::new(&SafetyConfig::default(), shutdown.clone()));
        Fixture {
            transport,
            shutdown,
            device: SolaxDevice::new(queue, governor),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_mode_uses_holding_register() {
        let f = fixture();
        f.transport.respond(Ok(vec![1]));

        assert_eq!(f.device.read_mode().await, Some(InverterMode::FeedInPriority));
        assert_eq!(
            f.transport.script.lock().calls,
            vec![Operation::ReadHolding {
                address: 0x008B,
                count: 1
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_mode_uses_write_address() {
        let f = fixture();

        assert!(f.device.write_mode(InverterMode::Backup).await);
        assert_eq!(
            f.transport.script.lock().calls,
            vec![Operation::WriteSingle {
                address: 0x001F,
                value: 2
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_limit_is_scaled() {
        let f = fixture();
        f.transport.respond(Ok(vec![395]));

        assert_eq!(f.device.read_export_limit_watts().await, Some(3950));
        assert_eq!(f.device.write_export_limit_watts(2000).await, Ok(true));
        assert_eq!(
            f.transport.script.lock().calls.last(),
            Some(&Operation::WriteSingle {
                address: 0x0042,
                value: 200
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_export_limit_is_rejected_without_io() {
        let f = fixture();

        assert_eq!(
            f.device.write_export_limit_watts(10_001).await,
            Err(ExportLimitError { watts: 10_001 })
        );
        assert!(f.device.write_export_limit_watts(-5).await.is_err());
        assert!(f.transport.script.lock().calls.is_empty());
        assert_eq!(f.device.governor().consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_is_none_and_counted() {
        let f = fixture();
        f.transport
            .respond(Err(ModbusError::Timeout(Duration::from_secs(5))));

        assert_eq!(f.device.read_battery_percent().await, None);
        assert_eq!(f.device.governor().consecutive_failures(), 1);

        f.transport.respond(Ok(vec![64]));
        assert_eq!(f.device.read_battery_percent().await, Some(64));
        assert_eq!(f.device.governor().consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_ordinal_counts_as_failure() {
        let f = fixture();
        f.transport.respond(Ok(vec![9]));

        assert_eq!(f.device.read_mode().await, None);
        assert_eq!(f.device.governor().consecutive_failures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_stops_device_access() {
        let f = fixture();
        for _ in 0..5 {
            f.transport
                .respond(Err(ModbusError::Exception("SlaveDeviceFailure".to_owned())));
        }

        for _ in 0..5 {
            assert_eq!(f.device.read_mode().await, None);
        }
        assert_eq!(f.shutdown.calls(), 1);

        let calls_before = f.transport.script.lock().calls.len();
        assert_eq!(f.device.read_mode().await, None);
        assert!(!f.device.write_mode(InverterMode::SelfUse).await);
        assert_eq!(f.transport.script.lock().calls.len(), calls_before);
        assert_eq!(f.shutdown.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_budget_trips_on_excess_writes() {
        let f = fixture();

        for _ in 0..10 {
            assert!(f.device.write_mode(InverterMode::SelfUse).await);
        }
        assert!(!f.device.write_mode(InverterMode::SelfUse).await);
        assert_eq!(f.shutdown.calls(), 1);
        assert_eq!(f.transport.script.lock().calls.len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_dc_power() {
        let f = fixture();
        f.transport.respond(Ok(vec![1200, 800]));

        assert_eq!(f.device.read_dc_power().await, Some([1200, 800]));
    }
}
