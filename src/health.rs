//! API health polling / API 健康检查
//!
//! Polls the health endpoint on a fixed interval and publishes the
//! result for a status indicator. No retry or backoff beyond the interval.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::transport::SearchTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStatus {
    /// No probe has completed yet
    Unknown,
    Online,
    Offline,
}

impl ApiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiStatus::Unknown => "unknown",
            ApiStatus::Online => "online",
            ApiStatus::Offline => "offline",
        }
    }
}

/// Single health probe
pub async fn probe(transport: &dyn SearchTransport) -> ApiStatus {
    match transport.check_health().await {
        Ok(()) => ApiStatus::Online,
        Err(e) => {
            tracing::debug!("Health check failed: {}", e);
            ApiStatus::Offline
        }
    }
}

/// Background poller; stops when dropped / 后台健康检查
pub struct HealthMonitor {
    status: watch::Receiver<ApiStatus>,
    task: JoinHandle<()>,
}

impl HealthMonitor {
    /// Start polling immediately, then every `interval`.
    pub fn spawn(transport: Arc<dyn SearchTransport>, interval: Duration) -> Self {
        let (sender, status) = watch::channel(ApiStatus::Unknown);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let next = probe(transport.as_ref()).await;
                let previous = sender.send_replace(next);
                if previous != next {
                    tracing::info!("API status: {} -> {}", previous.as_str(), next.as_str());
                }
            }
        });

        Self { status, task }
    }

    pub fn status(&self) -> ApiStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ApiStatus> {
        self.status.clone()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
