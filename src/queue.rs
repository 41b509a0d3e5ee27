use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, warn};

use crate::transport::Transport;

const TOO_MANY_REQUESTS: u16 = 429;

/// How [`deliver`] reacts to rate limiting (HTTP 429).
///
/// The wait starts at `initial_backoff` and doubles after every 429. With
/// the defaults a rate-limited message is retried until it goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    /// Upper bound for a single wait. `None` keeps doubling.
    pub max_backoff: Option<Duration>,
    /// Retries allowed per message. `None` retries indefinitely.
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            max_backoff: None,
            max_retries: None,
        }
    }
}

/// A message that could not be delivered.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("destination rejected message with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("destination still rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("delivery worker has stopped")]
    WorkerStopped,
}

/// Returned by [`DeliveryQueue::enqueue`] once the worker is gone. Holds
/// the body that was not queued.
#[derive(thiserror::Error, Debug)]
#[error("delivery queue is closed")]
pub struct QueueClosed(pub Value);

/// POST `body` to `url`, retrying while the destination answers 429.
///
/// Any other status of 300 or above fails immediately, as does a
/// transport error.
pub async fn deliver(
    transport: &dyn Transport,
    url: &str,
    body: &Value,
    retry: &RetryPolicy,
) -> Result<(), DeliveryError> {
    let mut backoff = retry.initial_backoff;
    let mut retries = 0u32;

    loop {
        let resp = transport
            .post(url, body)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        match resp.status {
            TOO_MANY_REQUESTS => {
                if retry.max_retries.is_some_and(|max| retries >= max) {
                    return Err(DeliveryError::RateLimited { retries });
                }
                let backoff_ms = backoff.as_millis() as u64;
                debug!(url, retries, backoff_ms, "rate limited, retrying");
                sleep(backoff).await;
                retries += 1;
                backoff = backoff.checked_mul(2).unwrap_or(backoff);
                if let Some(max) = retry.max_backoff {
                    backoff = backoff.min(max);
                }
            }
            status if status >= 300 => {
                return Err(DeliveryError::Status { status, body: resp.body });
            }
            _ => return Ok(()),
        }
    }
}

enum Command {
    Deliver(Value),
    Flush(oneshot::Sender<()>),
}

/// Ordered, single-consumer delivery queue for one destination.
///
/// Producers call [`enqueue`](Self::enqueue), which never blocks; a
/// background task delivers bodies one at a time in enqueue order. A
/// failed message does not stop the queue: the failure is kept as the
/// last error (only the most recent one) until replaced or taken.
#[derive(Clone)]
pub struct DeliveryQueue {
    url: Arc<str>,
    sender: mpsc::UnboundedSender<Command>,
    last_error: Arc<Mutex<Option<DeliveryError>>>,
    /// Messages accepted by the destination.
    pub delivered: Arc<AtomicU64>,
    /// Messages that ended in a [`DeliveryError`].
    pub failed: Arc<AtomicU64>,
}

impl DeliveryQueue {
    /// Create the queue and spawn its worker on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn spawn(
        url: impl Into<String>,
        transport: Arc<dyn Transport>,
        retry: RetryPolicy,
    ) -> (Self, JoinHandle<()>) {
        let url: Arc<str> = Arc::from(url.into());
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();

        let last_error = Arc::new(Mutex::new(None));
        let delivered = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));

        let url_bg = Arc::clone(&url);
        let last_error_bg = Arc::clone(&last_error);
        let delivered_bg = Arc::clone(&delivered);
        let failed_bg = Arc::clone(&failed);

        let handle = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Deliver(body) => {
                        let result = deliver(&*transport, &url_bg, &body, &retry).await;
                        match result {
                            Ok(()) => {
                                delivered_bg.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) => {
                                error!(url = %url_bg, error = %e, "failed to deliver message");
                                failed_bg.fetch_add(1, Ordering::Relaxed);
                                *lock(&last_error_bg) = Some(e);
                            }
                        }
                    }
                    Command::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!(url = %url_bg, "delivery queue closed");
        });

        (
            Self {
                url,
                sender: tx,
                last_error,
                delivered,
                failed,
            },
            handle,
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Queue `body` for delivery after everything queued before it.
    pub fn enqueue(&self, body: Value) -> Result<(), QueueClosed> {
        self.sender.send(Command::Deliver(body)).map_err(|err| match err.0 {
            Command::Deliver(body) => QueueClosed(body),
            Command::Flush(_) => QueueClosed(Value::Null),
        })
    }

    /// Wait until every message queued before this call has been handled,
    /// then return the last recorded error, if any. The error stays
    /// recorded; use [`take_last_error`](Self::take_last_error) to clear it.
    pub async fn flush(&self) -> Result<(), DeliveryError> {
        let (done_tx, done_rx) = oneshot::channel();
        if self.sender.send(Command::Flush(done_tx)).is_err() || done_rx.await.is_err() {
            warn!(url = %self.url, "flush requested after the delivery worker stopped");
            return Err(DeliveryError::WorkerStopped);
        }
        match self.last_error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn last_error(&self) -> Option<DeliveryError> {
        lock(&self.last_error).clone()
    }

    pub fn take_last_error(&self) -> Option<DeliveryError> {
        lock(&self.last_error).take()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::transport::{TransportError, TransportResponse};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    /// Answers with scripted statuses (204 once the script runs out) and
    /// records every request.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        statuses: Mutex<VecDeque<Result<u16, String>>>,
        pub(crate) calls: Mutex<Vec<(String, Value, Instant)>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(statuses: impl IntoIterator<Item = u16>) -> Arc<Self> {
            Arc::new(ScriptedTransport {
                statuses: Mutex::new(statuses.into_iter().map(Ok).collect()),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn accepting() -> Arc<Self> {
            ScriptedTransport::new(Vec::<u16>::new())
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(ScriptedTransport {
                statuses: Mutex::new(VecDeque::from([Err(message.to_string())])),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn bodies(&self) -> Vec<Value> {
            lock(&self.calls).iter().map(|(_, body, _)| body.clone()).collect()
        }

        fn times(&self) -> Vec<Instant> {
            lock(&self.calls).iter().map(|(_, _, at)| *at).collect()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post(&self, url: &str, body: &Value) -> Result<TransportResponse, TransportError> {
            lock(&self.calls).push((url.to_string(), body.clone(), Instant::now()));
            match lock(&self.statuses).pop_front() {
                Some(Ok(status)) => {
                    Ok(TransportResponse::new(status, format!("status {}", status)))
                }
                Some(Err(message)) => Err(message.into()),
                None => Ok(TransportResponse::new(204, "")),
            }
        }
    }

    const URL: &str = "https://discord.test/api/webhooks/1/abc";

    #[tokio::test(start_paused = true)]
    async fn retries_once_after_rate_limit() {
        let transport = ScriptedTransport::new([429, 200]);
        let start = Instant::now();

        deliver(&*transport, URL, &json!({"content": "hi"}), &RetryPolicy::default())
            .await
            .unwrap();

        let times = transport.times();
        assert_eq!(times.len(), 2);
        assert!(times[1] - start >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_between_rate_limits() {
        let transport = ScriptedTransport::new([429, 429, 429, 204]);

        deliver(&*transport, URL, &json!({}), &RetryPolicy::default()).await.unwrap();

        let times = transport.times();
        assert_eq!(times.len(), 4);
        assert!(times[1] - times[0] >= Duration::from_millis(100));
        assert!(times[2] - times[1] >= Duration::from_millis(200));
        assert!(times[3] - times[2] >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_bound_is_honoured() {
        let transport = ScriptedTransport::new([429; 5]);
        let retry = RetryPolicy {
            max_retries: Some(2),
            max_backoff: Some(Duration::from_millis(150)),
            ..RetryPolicy::default()
        };

        let err = deliver(&*transport, URL, &json!({}), &retry).await.unwrap_err();

        assert_eq!(err, DeliveryError::RateLimited { retries: 2 });
        let times = transport.times();
        assert_eq!(times.len(), 3);
        assert!(times[2] - times[1] >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn non_rate_limit_errors_are_not_retried() {
        let transport = ScriptedTransport::new([400]);
        let err = deliver(&*transport, URL, &json!({}), &RetryPolicy::default()).await.unwrap_err();
        assert_eq!(
            err,
            DeliveryError::Status {
                status: 400,
                body: "status 400".to_string()
            }
        );
        assert_eq!(transport.bodies().len(), 1);

        let transport = ScriptedTransport::failing("connection refused");
        let err = deliver(&*transport, URL, &json!({}), &RetryPolicy::default()).await.unwrap_err();
        assert_eq!(err, DeliveryError::Transport("connection refused".to_string()));
    }

    #[tokio::test]
    async fn delivers_in_enqueue_order() {
        let transport = ScriptedTransport::accepting();
        let (queue, _handle) = DeliveryQueue::spawn(URL, transport.clone(), RetryPolicy::default());

        for i in 0..50 {
            queue.enqueue(json!({ "content": i })).unwrap();
        }
        queue.flush().await.unwrap();

        let expected: Vec<Value> = (0..50).map(|i| json!({ "content": i })).collect();
        assert_eq!(transport.bodies(), expected);
        assert_eq!(queue.delivered.load(Ordering::Relaxed), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_message_holds_back_later_ones() {
        let transport = ScriptedTransport::new([429, 429]);
        let (queue, _handle) = DeliveryQueue::spawn(URL, transport.clone(), RetryPolicy::default());

        queue.enqueue(json!({ "content": "first" })).unwrap();
        queue.enqueue(json!({ "content": "second" })).unwrap();
        queue.flush().await.unwrap();

        assert_eq!(
            transport.bodies(),
            vec![
                json!({ "content": "first" }),
                json!({ "content": "first" }),
                json!({ "content": "first" }),
                json!({ "content": "second" }),
            ]
        );
    }

    #[tokio::test]
    async fn failure_is_recorded_and_queue_keeps_going() {
        let transport = ScriptedTransport::new([500]);
        let (queue, _handle) = DeliveryQueue::spawn(URL, transport.clone(), RetryPolicy::default());

        queue.enqueue(json!({ "content": "a" })).unwrap();
        queue.enqueue(json!({ "content": "b" })).unwrap();
        let err = queue.flush().await.unwrap_err();

        assert!(matches!(err, DeliveryError::Status { status: 500, .. }));
        assert_eq!(transport.bodies().len(), 2);
        assert_eq!(queue.failed.load(Ordering::Relaxed), 1);
        assert_eq!(queue.delivered.load(Ordering::Relaxed), 1);

        // Sticky until taken.
        assert!(queue.flush().await.is_err());
        assert!(queue.take_last_error().is_some());
        queue.flush().await.unwrap();
    }

    #[tokio::test]
    async fn enqueue_fails_once_worker_is_gone() {
        let transport = ScriptedTransport::accepting();
        let (queue, handle) = DeliveryQueue::spawn(URL, transport, RetryPolicy::default());
        handle.abort();
        let _ = handle.await;

        let err = queue.enqueue(json!({ "content": "late" })).unwrap_err();
        assert_eq!(err.0, json!({ "content": "late" }));
        assert_eq!(queue.flush().await.unwrap_err(), DeliveryError::WorkerStopped);
    }
}
