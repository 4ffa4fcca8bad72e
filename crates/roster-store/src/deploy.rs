//! Downstream redeploy after a committed write
//!
//! The trigger never blocks the write path and its failure is only logged.
//! Short-lived callers [`settle`](DeployTrigger::settle) before exiting so an
//! in-flight hook is not dropped with the runtime.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// How long a caller waits for in-flight hooks before giving up on them
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Hook invoked once per successful remote commit
#[async_trait]
pub trait DeployTrigger: Send + Sync + Debug {
    /// Request a redeploy; must not block
    fn trigger(&self, reason: &str);

    /// Wait up to `within` for requests still in flight
    async fn settle(&self, _within: Duration) {}
}

/// Trigger that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTrigger;

impl DeployTrigger for NoopTrigger {
    fn trigger(&self, _reason: &str) {}
}

/// POSTs to a deploy hook URL on a spawned task
#[derive(Debug, Clone)]
pub struct WebhookTrigger {
    client: reqwest::Client,
    url: String,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl WebhookTrigger {
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            pending: Arc::default(),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Requests spawned and not yet settled
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock_pending()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DeployTrigger for WebhookTrigger {
    fn trigger(&self, reason: &str) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(url = %self.url, "no async runtime; deploy hook not fired");
            return;
        };

        let client = self.client.clone();
        let url = self.url.clone();
        let body = serde_json::json!({ "reason": reason });
        let handle = runtime.spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::info!(%url, status = response.status().as_u16(), "deploy hook fired");
                }
                Ok(response) => {
                    tracing::warn!(%url, status = response.status().as_u16(), "deploy hook rejected");
                }
                Err(e) => {
                    tracing::warn!(%url, error = %e, "deploy hook failed");
                }
            }
        });

        let mut pending = self.lock_pending();
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }

    async fn settle(&self, within: Duration) {
        let handles = std::mem::take(&mut *self.lock_pending());
        if handles.is_empty() {
            return;
        }

        let count = handles.len();
        let drain = async {
            for handle in handles {
                // a panicked or cancelled hook was already lost
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(within, drain).await.is_err() {
            tracing::warn!(url = %self.url, count, timeout_secs = within.as_secs(), "deploy hook still in flight; abandoning");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_without_runtime_does_not_panic() {
        WebhookTrigger::new(reqwest::Client::new(), "http://127.0.0.1:9/hook").trigger("x");
    }

    #[tokio::test]
    async fn webhook_failure_is_swallowed() {
        let trigger = WebhookTrigger::new(reqwest::Client::new(), "http://127.0.0.1:9/hook");
        trigger.trigger("teachers.json");
        trigger.settle(SETTLE_TIMEOUT).await;
        assert_eq!(trigger.in_flight(), 0);
    }

    #[tokio::test]
    async fn settle_waits_for_in_flight_hook() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let served = tokio::spawn(async move {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            socket
                .write_all(b"HTTP/1.1 204 No Content\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
        });

        let trigger = WebhookTrigger::new(reqwest::Client::new(), url);
        trigger.trigger("teachers.json");
        assert_eq!(trigger.in_flight(), 1);

        trigger.settle(SETTLE_TIMEOUT).await;
        assert_eq!(trigger.in_flight(), 0);
        served.await.unwrap();
    }

    #[tokio::test]
    async fn settle_gives_up_after_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        // accepted by the kernel backlog, never answered
        let trigger = WebhookTrigger::new(reqwest::Client::new(), url);
        trigger.trigger("teachers.json");

        let started = std::time::Instant::now();
        trigger.settle(Duration::from_millis(100)).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        drop(listener);
    }

    #[tokio::test]
    async fn noop_settles_immediately() {
        NoopTrigger.settle(SETTLE_TIMEOUT).await;
    }
}
