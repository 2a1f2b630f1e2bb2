//! Asynchronous alert dispatch.
//!
//! Alerts fan out to every registered channel on their own tasks, so
//! delivery latency or channel failure never blocks the decision path.
//! Failed deliveries are retried with exponential backoff and recorded to a
//! dead-letter list after exhaustion.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::policy::{Severity, Stage};
use crate::telemetry::Telemetry;
use crate::Result;

/// The fixed alert schema delivered to every channel. Fields the engine
/// cannot determine are filled with `"unknown"` rather than omitted, so
/// downstream consumers always see the full shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPayload {
    /// The canary ID or rule ID that raised the alert
    pub source_id: String,
    /// The stage that raised the alert
    pub stage: Stage,
    /// Identity of the requesting subject
    pub subject_identity: String,
    /// Department of the requesting subject
    pub department: String,
    /// The query or request text involved
    pub query: String,
    /// Session identifier
    pub session_id: String,
    /// Source IP of the request
    pub ip: String,
    /// Severity of the event
    pub severity: Severity,
    /// When the alert was raised
    pub timestamp: DateTime<Utc>,
}

impl AlertPayload {
    /// Create a payload with every contextual field set to `"unknown"`.
    pub fn new(source_id: impl Into<String>, stage: Stage, severity: Severity) -> Self {
        Self {
            source_id: source_id.into(),
            stage,
            subject_identity: "unknown".to_string(),
            department: "unknown".to_string(),
            query: "unknown".to_string(),
            session_id: "unknown".to_string(),
            ip: "unknown".to_string(),
            severity,
            timestamp: Utc::now(),
        }
    }

    /// Set the subject identity.
    pub fn subject_identity(mut self, value: impl Into<String>) -> Self {
        self.subject_identity = value.into();
        self
    }

    /// Set the department.
    pub fn department(mut self, value: impl Into<String>) -> Self {
        self.department = value.into();
        self
    }

    /// Set the query text.
    pub fn query(mut self, value: impl Into<String>) -> Self {
        self.query = value.into();
        self
    }

    /// Set the session ID.
    pub fn session_id(mut self, value: impl Into<String>) -> Self {
        self.session_id = value.into();
        self
    }

    /// Set the source IP.
    pub fn ip(mut self, value: impl Into<String>) -> Self {
        self.ip = value.into();
        self
    }
}

/// A delivery target for alerts. Implementations wrap whatever transport
/// the deployment uses (SIEM forwarder, webhook, pager).
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Channel name used in logs and dead-letter records.
    fn name(&self) -> &str;

    /// Deliver one alert. Errors are retried by the dispatcher.
    async fn send(&self, payload: &AlertPayload) -> Result<()>;
}

/// Retry schedule for failed deliveries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total delivery attempts, including the first
    pub max_attempts: u32,
    /// Backoff before the first retry
    pub base_backoff: Duration,
    /// Upper bound on any single backoff
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the given retry (1-based), doubling each time and
    /// capped at `max_backoff`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        let backoff = self.base_backoff.saturating_mul(1u32 << exp);
        backoff.min(self.max_backoff)
    }
}

/// A delivery that exhausted its retries.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    /// The channel that failed
    pub channel: String,
    /// The undelivered payload
    pub payload: AlertPayload,
    /// The final error message
    pub error: String,
    /// Attempts made
    pub attempts: u32,
    /// When the delivery was abandoned
    pub failed_at: DateTime<Utc>,
}

struct DispatcherInner {
    channels: Vec<Arc<dyn AlertChannel>>,
    retry: RetryPolicy,
    dead_letters: Mutex<Vec<DeadLetter>>,
    telemetry: Arc<Telemetry>,
}

/// Fans alerts out to registered channels on background tasks.
#[derive(Clone)]
pub struct AlertDispatcher {
    inner: Arc<DispatcherInner>,
}

impl AlertDispatcher {
    /// Create a dispatcher with no channels.
    pub fn new(retry: RetryPolicy, telemetry: Arc<Telemetry>) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                channels: Vec::new(),
                retry,
                dead_letters: Mutex::new(Vec::new()),
                telemetry,
            }),
        }
    }

    /// Return a dispatcher with the channel added. Channels are fixed after
    /// the engine is built, so the inner state is rebuilt rather than locked.
    pub fn with_channel(self, channel: Arc<dyn AlertChannel>) -> Self {
        let mut channels = self.inner.channels.clone();
        channels.push(channel);
        Self {
            inner: Arc::new(DispatcherInner {
                channels,
                retry: self.inner.retry.clone(),
                dead_letters: Mutex::new(self.inner.dead_letters.lock().drain(..).collect()),
                telemetry: Arc::clone(&self.inner.telemetry),
            }),
        }
    }

    /// Fire-and-forget dispatch: spawns one delivery task per channel and
    /// returns immediately. Outside a runtime the alert is dead-lettered
    /// instead of delivered.
    pub fn dispatch(&self, payload: AlertPayload) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(source_id = %payload.source_id, "no async runtime, dead-lettering alert");
                for channel in &self.inner.channels {
                    self.inner.telemetry.record_dispatch_failure();
                    self.inner.dead_letters.lock().push(DeadLetter {
                        channel: channel.name().to_string(),
                        payload: payload.clone(),
                        error: "no async runtime available".to_string(),
                        attempts: 0,
                        failed_at: Utc::now(),
                    });
                }
                return;
            }
        };
        for channel in &self.inner.channels {
            let inner = Arc::clone(&self.inner);
            let channel = Arc::clone(channel);
            let payload = payload.clone();
            handle.spawn(async move {
                deliver(inner, channel, payload).await;
            });
        }
    }

    /// Dispatch and wait for every channel to settle. Used by tests and
    /// shutdown paths.
    pub async fn dispatch_and_wait(&self, payload: AlertPayload) {
        let deliveries = self.inner.channels.iter().map(|channel| {
            let inner = Arc::clone(&self.inner);
            let channel = Arc::clone(channel);
            let payload = payload.clone();
            async move {
                deliver(inner, channel, payload).await;
            }
        });
        futures::future::join_all(deliveries).await;
    }

    /// Deliveries abandoned after retry exhaustion.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.inner.dead_letters.lock().clone()
    }

    /// Number of registered channels.
    pub fn channel_count(&self) -> usize {
        self.inner.channels.len()
    }
}

async fn deliver(inner: Arc<DispatcherInner>, channel: Arc<dyn AlertChannel>, payload: AlertPayload) {
    let mut last_error = String::new();
    for attempt in 1..=inner.retry.max_attempts {
        match channel.send(&payload).await {
            Ok(()) => {
                info!(
                    channel = channel.name(),
                    source_id = %payload.source_id,
                    attempt,
                    "alert delivered"
                );
                inner.telemetry.record_alert_dispatched();
                return;
            }
            Err(e) => {
                last_error = e.to_string();
                warn!(
                    channel = channel.name(),
                    source_id = %payload.source_id,
                    attempt,
                    error = %last_error,
                    "alert delivery failed"
                );
                if attempt < inner.retry.max_attempts {
                    tokio::time::sleep(inner.retry.backoff(attempt)).await;
                }
            }
        }
    }
    inner.telemetry.record_dispatch_failure();
    inner.dead_letters.lock().push(DeadLetter {
        channel: channel.name().to_string(),
        payload,
        error: last_error,
        attempts: inner.retry.max_attempts,
        failed_at: Utc::now(),
    });
}
