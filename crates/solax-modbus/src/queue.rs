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
use crate::link::Link;
use crate::transport::Operation;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, info};

/// Pacing and idle handling for the queue worker
#[derive(Debug, Clone, Copy)]
pub struct QueueTiming {
    /// Pause after every request before the next is taken
    pub delay: Duration,
    pub idle_timeout: Duration,
    pub watchdog_tick: Duration,
}

/// Work item with its completion handle, consumed once by the worker
#[derive(Debug)]
struct PendingRequest {
    operation: Operation,
    respond: oneshot::Sender<Result<Vec<u16>>>,
}

#[derive(Debug)]
enum Message {
    Request(PendingRequest),
    Close(oneshot::Sender<()>),
}

/// Serializes all device access through one worker that owns the [`Link`].
///
/// Requests complete in submission order and never overlap on the wire.
#[derive(Debug, Clone)]
pub struct RequestQueue {
    sender: mpsc::UnboundedSender<Message>,
}

impl RequestQueue {
    pub fn spawn(link: Link, timing: QueueTiming) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        info!("Modbus request queue started with {:?} delay", timing.delay);
        let worker = tokio::spawn(run_worker(link, receiver, timing));
        (Self { sender }, worker)
    }

    /// Enqueue `operation` and wait for its result
    pub async fn submit(&self, operation: Operation) -> Result<Vec<u16>> {
        let (respond, result) = oneshot::channel();
        self.sender
            .send(Message::Request(PendingRequest { operation, respond }))
            .map_err(|_| ModbusError::QueueClosed)?;
        result.await.map_err(|_| ModbusError::QueueClosed)?
    }

    /// Disconnect the link and stop the worker after already queued requests
    pub async fn close(&self) {
        let (done, closed) = oneshot::channel();
        if self.sender.send(Message::Close(done)).is_ok() {
            let _ = closed.await;
        }
    }
}

async fn run_worker(
    mut link: Link,
    mut receiver: mpsc::UnboundedReceiver<Message>,
    timing: QueueTiming,
) {
    let mut watchdog = interval(timing.watchdog_tick);
    watchdog.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            message = receiver.recv() => match message {
                Some(Message::Request(request)) => {
                    debug!("Executing {}", request.operation);
                    let result = link.execute(&request.operation).await;
                    if request.respond.send(result).is_err() {
                        debug!("Requester went away before completion");
                    }
                    sleep(timing.delay).await;
                }
                Some(Message::Close(done)) => {
                    link.disconnect().await;
                    let _ = done.send(());
                    break;
                }
                None => {
                    link.disconnect().await;
                    break;
                }
            },
            _ = watchdog.tick() => {
                link.disconnect_if_idle(timing.idle_timeout).await;
            }
        }
    }

    info!("Modbus request queue stopped");
}
