use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use deplo_core::config::FailurePolicy;
use deplo_core::{DeploymentError, DeploymentPipeline, DeploymentReport, Disposition};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport settlement failed: {0}")]
    Settle(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// One message taken off the queue, settled later by `tag`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub tag: u64,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait QueueTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the stream closed cleanly and the listener should stop.
    async fn next_delivery(&self) -> Result<Option<Delivery>, TransportError>;
    async fn settle(&self, tag: u64, disposition: Disposition) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn handle(
        &self,
        body: &[u8],
        correlation_id: &str,
    ) -> Result<DeploymentReport, DeploymentError>;
}

#[async_trait]
impl DeliveryHandler for DeploymentPipeline {
    async fn handle(
        &self,
        body: &[u8],
        correlation_id: &str,
    ) -> Result<DeploymentReport, DeploymentError> {
        DeploymentPipeline::handle(self, body, correlation_id).await
    }
}

/// Shared with the health endpoint.
#[derive(Debug, Default)]
pub struct ListenerStatus {
    connected: AtomicBool,
    processed: AtomicU64,
    failed: AtomicU64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ListenerSnapshot {
    pub connected: bool,
    pub processed: u64,
    pub failed: u64,
}

impl ListenerStatus {
    pub fn snapshot(&self) -> ListenerSnapshot {
        ListenerSnapshot {
            connected: self.connected.load(Ordering::Acquire),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    fn record(&self, succeeded: bool) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

enum PumpFailure {
    Connect(TransportError),
    /// The connection was up and then broke; the retry budget starts over.
    Stream(TransportError),
}

pub struct QueueListener {
    transport: Arc<dyn QueueTransport>,
    handler: Arc<dyn DeliveryHandler>,
    reconnect_policy: ReconnectPolicy,
    on_failure: FailurePolicy,
    max_in_flight: usize,
    status: Arc<ListenerStatus>,
}

impl QueueListener {
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        handler: Arc<dyn DeliveryHandler>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self {
            transport,
            handler,
            reconnect_policy,
            on_failure: FailurePolicy::default(),
            max_in_flight: 1,
            status: Arc::new(ListenerStatus::default()),
        }
    }

    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    pub fn max_in_flight(mut self, limit: u16) -> Self {
        self.max_in_flight = usize::from(limit.max(1));
        self
    }

    pub fn status(&self) -> Arc<ListenerStatus> {
        self.status.clone()
    }

    /// Consumes until the transport closes cleanly or reconnect retries run out. Neither
    /// case is an error for the process.
    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            let outcome = self.connect_and_pump(attempt).await;
            self.status.set_connected(false);

            let transport_error = match outcome {
                Ok(()) => return Ok(()),
                Err(PumpFailure::Connect(error)) => error,
                Err(PumpFailure::Stream(error)) => {
                    attempt = 0;
                    error
                }
            };

            warn!(
                event_name = "ingress.queue.transport_failed",
                attempt,
                max_retries = self.reconnect_policy.max_retries,
                error = %transport_error,
                "queue transport failed"
            );

            if attempt >= self.reconnect_policy.max_retries {
                warn!(
                    event_name = "ingress.queue.retries_exhausted",
                    max_retries = self.reconnect_policy.max_retries,
                    "queue retries exhausted; continuing process without crash"
                );
                return Ok(());
            }

            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), PumpFailure> {
        info!(attempt, "opening queue transport connection");
        self.transport.connect().await.map_err(PumpFailure::Connect)?;
        self.status.set_connected(true);
        info!(event_name = "ingress.queue.connected", attempt, "queue transport connected");

        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut in_flight = JoinSet::new();

        let result = loop {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break Ok(());
            };
            let delivery = match self.transport.next_delivery().await {
                Ok(Some(delivery)) => delivery,
                Ok(None) => {
                    info!(attempt, "queue transport stream closed");
                    break Ok(());
                }
                Err(error) => break Err(PumpFailure::Stream(error)),
            };

            let correlation_id = Uuid::new_v4().to_string();
            info!(
                event_name = "ingress.queue.delivery_received",
                correlation_id = %correlation_id,
                delivery_tag = delivery.tag,
                body_bytes = delivery.body.len(),
                "received queue delivery"
            );

            let transport = self.transport.clone();
            let handler = self.handler.clone();
            let status = self.status.clone();
            let on_failure = self.on_failure;
            in_flight.spawn(async move {
                let result = handler.handle(&delivery.body, &correlation_id).await;
                let disposition = on_failure.disposition(&result);
                status.record(result.is_ok());
                settle(transport.as_ref(), delivery.tag, disposition, &correlation_id).await;
                drop(permit);
            });

            while let Some(joined) = in_flight.try_join_next() {
                report_join(joined);
            }
        };

        while let Some(joined) = in_flight.join_next().await {
            report_join(joined);
        }

        if result.is_ok() {
            self.transport.disconnect().await.map_err(PumpFailure::Stream)?;
        }
        result
    }
}

/// A panicked delivery task never settled its message; the broker redelivers it once the
/// channel closes.
fn report_join(joined: Result<(), JoinError>) -> bool {
    match joined {
        Ok(()) => true,
        Err(error) => {
            warn!(
                event_name = "ingress.queue.delivery_aborted",
                error = %error,
                "delivery task ended abnormally"
            );
            false
        }
    }
}

async fn settle(
    transport: &dyn QueueTransport,
    tag: u64,
    disposition: Disposition,
    correlation_id: &str,
) {
    match transport.settle(tag, disposition).await {
        Ok(()) => debug!(
            event_name = "ingress.queue.settled",
            correlation_id,
            delivery_tag = tag,
            disposition = ?disposition,
            "settled queue delivery"
        ),
        Err(error) => warn!(
            event_name = "ingress.queue.settled",
            correlation_id,
            delivery_tag = tag,
            disposition = ?disposition,
            error = %error,
            "failed to settle queue delivery"
        ),
    }
}
