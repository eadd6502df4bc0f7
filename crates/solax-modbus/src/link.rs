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

use crate::error::Result;
use crate::transport::{Operation, Transport};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, trace, warn};

/// Connection flag and last traffic time
#[derive(Debug, Clone, Copy)]
pub struct LinkSession {
    pub connected: bool,
    pub last_activity: Instant,
}

/// Connection lifecycle around a [`Transport`].
///
/// Never reconnects on its own. The next [`Link::execute`] after a
/// disconnect opens a fresh session.
#[derive(Debug)]
pub struct Link {
    transport: Box<dyn Transport>,
    session: LinkSession,
}

impl Link {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            session: LinkSession {
                connected: false,
                last_activity: Instant::now(),
            },
        }
    }

    pub fn session(&self) -> LinkSession {
        self.session
    }

    pub fn is_connected(&self) -> bool {
        self.session.connected
    }

    pub async fn connect(&mut self) -> Result<()> {
        if self.session.connected {
            return Ok(());
        }

        trace!("Opening link");
        if let Err(e) = self.transport.open().await {
            error!("❌ Unable to connect to Solax inverter: {e}");
            return Err(e);
        }

        self.session.connected = true;
        self.touch();
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        if !self.session.connected {
            return;
        }
        self.transport.close().await;
        self.session.connected = false;
    }

    /// Run one operation, connecting first when needed
    pub async fn execute(&mut self, operation: &Operation) -> Result<Vec<u16>> {
        self.connect().await?;

        match self.transport.call(operation).await {
            Ok(words) => {
                self.touch();
                Ok(words)
            }
            Err(e) => {
                if e.breaks_session() {
                    warn!("Dropping link after transport failure: {e}");
                    self.disconnect().await;
                }
                Err(e)
            }
        }
    }

    /// Disconnect when idle for at least `idle_timeout`. Returns `true` if it did.
    pub async fn disconnect_if_idle(&mut self, idle_timeout: Duration) -> bool {
        if !self.session.connected || self.session.last_activity.elapsed() < idle_timeout {
            return false;
        }
        self.disconnect().await;
        info!("Disconnected from Solax inverter due to inactivity");
        true
    }

    fn touch(&mut self) {
        self.session.last_activity = Instant::now();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ModbusError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Shared view into a [`ScriptedTransport`]
    #[derive(Debug, Default)]
    pub struct Script {
        pub opens: usize,
        pub closes: usize,
        pub fail_open: bool,
        pub calls: Vec<Operation>,
        /// Responses handed out in order; exhausted script answers with zeroes
        pub responses: VecDeque<Result<Vec<u16>>>,
    }

    #[derive(Debug, Default, Clone)]
    pub struct ScriptedTransport {
        pub script: Arc<Mutex<Script>>,
    }

    impl ScriptedTransport {
        pub fn respond(&self, response: Result<Vec<u16>>) {
            self.script.lock().responses.push_back(response);
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn open(&mut self) -> Result<()> {
            let mut script = self.script.lock();
            script.opens += 1;
            if script.fail_open {
                return Err(ModbusError::Connect {
                    address: "test:502".to_owned(),
                    source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
                });
            }
            Ok(())
        }

        async fn close(&mut self) {
            self.script.lock().closes += 1;
        }

        async fn call(&mut self, operation: &Operation) -> Result<Vec<u16>> {
            let mut script = self.script.lock();
            script.calls.push(operation.clone());
            script.responses.pop_front().unwrap_or_else(|| match operation {
                Operation::ReadInput { count, .. } | Operation::ReadHolding { count, .. } => {
                    Ok(vec![0; usize::from(*count)])
                }
                Operation::WriteSingle { .. } | Operation::WriteMultiple { .. } => Ok(Vec::new()),
            })
        }
    }

    const READ: Operation = Operation::ReadInput {
        address: 0x1C,
        count: 1,
    };

    #[tokio::test]
    async fn test_connect_and_disconnect_are_idempotent() {
        let transport = ScriptedTransport::default();
        let mut link = Link::new(Box::new(transport.clone()));

        link.connect().await.unwrap();
        link.connect().await.unwrap();
        assert!(link.is_connected());
        assert_eq!(transport.script.lock().opens, 1);

        link.disconnect().await;
        link.disconnect().await;
        assert!(!link.is_connected());
        assert_eq!(transport.script.lock().closes, 1);
    }

    #[tokio::test]
    async fn test_execute_connects_on_demand() {
        let transport = ScriptedTransport::default();
        transport.respond(Ok(vec![55]));
        let mut link = Link::new(Box::new(transport.clone()));

        assert_eq!(link.execute(&READ).await.unwrap(), vec![55]);
        assert!(link.is_connected());
        assert_eq!(transport.script.lock().calls, vec![READ]);
    }

    #[tokio::test]
    async fn test_connect_failure_fails_the_operation() {
        let transport = ScriptedTransport::default();
        transport.script.lock().fail_open = true;
        let mut link = Link::new(Box::new(transport.clone()));

        let err = link.execute(&READ).await.unwrap_err();
        assert!(matches!(err, ModbusError::Connect { .. }));
        assert!(transport.script.lock().calls.is_empty());
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn test_io_failure_drops_session() {
        let transport = ScriptedTransport::default();
        transport.respond(Err(ModbusError::Timeout(Duration::from_secs(5))));
        let mut link = Link::new(Box::new(transport.clone()));

        assert!(link.execute(&READ).await.is_err());
        assert!(!link.is_connected());

        // Next request reconnects transparently
        assert!(link.execute(&READ).await.is_ok());
        assert_eq!(transport.script.lock().opens, 2);
    }

    #[tokio::test]
    async fn test_device_exception_keeps_session() {
        let transport = ScriptedTransport::default();
        transport.respond(Err(ModbusError::Exception("IllegalDataAddress".to_owned())));
        let mut link = Link::new(Box::new(transport.clone()));

        assert!(link.execute(&READ).await.is_err());
        assert!(link.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_disconnect() {
        let transport = ScriptedTransport::default();
        let mut link = Link::new(Box::new(transport.clone()));
        let idle = Duration::from_secs(60);

        link.execute(&READ).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!link.disconnect_if_idle(idle).await);

        link.execute(&READ).await.unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!link.disconnect_if_idle(idle).await);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(link.disconnect_if_idle(idle).await);
        assert!(!link.is_connected());

        // Already disconnected
        assert!(!link.disconnect_if_idle(idle).await);
    }
}
