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

use crate::error::{ModbusError, Result};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::time::timeout;
use tokio_modbus::client::{Context, Reader, Writer, tcp};
use tokio_modbus::slave::Slave;
use tracing::{debug, info, trace};

/// One request on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    ReadInput { address: u16, count: u16 },
    ReadHolding { address: u16, count: u16 },
    WriteSingle { address: u16, value: u16 },
    WriteMultiple { address: u16, values: Vec<u16> },
}

impl Operation {
    pub fn is_write(&self) -> bool {
        matches!(self, Self::WriteSingle { .. } | Self::WriteMultiple { .. })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadInput { address, count } => write!(f, "read input 0x{address:04X} x{count}"),
            Self::ReadHolding { address, count } => {
                write!(f, "read holding 0x{address:04X} x{count}")
            }
            Self::WriteSingle { address, value } => {
                write!(f, "write single 0x{address:04X} = {value}")
            }
            Self::WriteMultiple { address, values } => {
                write!(f, "write multiple 0x{address:04X} x{}", values.len())
            }
        }
    }
}

/// Raw Modbus session. Only the link drives it.
#[async_trait]
pub trait Transport: Send + fmt::Debug {
    async fn open(&mut self) -> Result<()>;

    async fn close(&mut self);

    /// Execute `operation`; writes return an empty word list
    async fn call(&mut self, operation: &Operation) -> Result<Vec<u16>>;
}

/// Modbus TCP via tokio-modbus
pub struct TcpTransport {
    host: String,
    port: u16,
    unit_id: u8,
    io_timeout: Duration,
    context: Option<Context>,
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpTransport")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("unit_id", &self.unit_id)
            .field("open", &self.context.is_some())
            .finish_non_exhaustive()
    }
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16, unit_id: u8, io_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            unit_id,
            io_timeout,
            context: None,
        }
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn bounded<T, F>(io_timeout: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = io::Result<T>>,
    {
        match timeout(io_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.kind() == io::ErrorKind::Other => {
                Err(ModbusError::Exception(e.to_string()))
            }
            Ok(Err(e)) => Err(ModbusError::Io(e)),
            Err(_) => Err(ModbusError::Timeout(io_timeout)),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&mut self) -> Result<()> {
        let address = self.address();
        let unit_id = self.unit_id;
        let io_timeout = self.io_timeout;
        debug!("Connecting to Modbus TCP server at {address}");

        let connect = async {
            let socket = tokio::net::lookup_host(&address)
                .await?
                .next()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "host did not resolve"))?;
            tcp::connect_slave(socket, Slave(unit_id)).await
        };

        let context = match timeout(io_timeout, connect).await {
            Ok(Ok(context)) => context,
            Ok(Err(source)) => return Err(ModbusError::Connect { address, source }),
            Err(_) => return Err(ModbusError::Timeout(io_timeout)),
        };

        self.context = Some(context);
        info!("🔌 Connected to Solax inverter at {address} (unit {})", self.unit_id);
        Ok(())
    }

    async fn close(&mut self) {
        if self.context.take().is_some() {
            debug!("Disconnected from Modbus TCP server {}", self.address());
        }
    }

    async fn call(&mut self, operation: &Operation) -> Result<Vec<u16>> {
        let Some(mut context) = self.context.take() else {
            return Err(ModbusError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "transport is not open",
            )));
        };
        trace!("Modbus TX: {operation}");

        let io_timeout = self.io_timeout;
        let result = match operation {
            Operation::ReadInput { address, count } => {
                Self::bounded(io_timeout, context.read_input_registers(*address, *count)).await
            }
            Operation::ReadHolding { address, count } => {
                Self::bounded(io_timeout, context.read_holding_registers(*address, *count)).await
            }
            Operation::WriteSingle { address, value } => {
                Self::bounded(io_timeout, context.write_single_register(*address, *value))
                    .await
                    .map(|()| Vec::new())
            }
            Operation::WriteMultiple { address, values } => {
                Self::bounded(io_timeout, context.write_multiple_registers(*address, values))
                    .await
                    .map(|()| Vec::new())
            }
        };

        self.context = Some(context);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn require_send<F: Future + Send>(future: F) -> F {
        future
    }

    #[test]
    fn test_transport_futures_are_send() {
        let mut transport = TcpTransport::new("192.0.2.1", 502, 1, Duration::from_secs(1));
        drop(require_send(transport.open()));
        let operation = Operation::ReadHolding {
            address: 0x008B,
            count: 1,
        };
        drop(require_send(transport.call(&operation)));
    }

    #[tokio::test]
    async fn test_call_without_open_is_not_connected() {
        let mut transport = TcpTransport::new("192.0.2.1", 502, 1, Duration::from_secs(1));
        let operation = Operation::WriteSingle {
            address: 0x001F,
            value: 1,
        };

        let result = transport.call(&operation).await;

        assert!(
            matches!(result, Err(ModbusError::Io(ref e)) if e.kind() == io::ErrorKind::NotConnected)
        );
    }
}
