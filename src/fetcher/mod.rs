//! Concurrency-bounded HTTP execution
//!
//! The [`Fetcher`] runs every outbound request of a run. It enforces the connection
//! ceiling (`max_connections`), retries transient failures with backoff, honours an
//! optional overall deadline and aborts queued or sleeping requests when the run is
//! cancelled. The wire exchange itself sits behind [`HttpTransport`].

mod transport;

pub use transport::ReqwestTransport;

use crate::config::{NetworkConfig, RetryConfig};
use crate::error::FetchError;
use crate::retry::{RetryState, with_retry};
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One outbound GET request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchRequest {
    /// Absolute URL without query string
    pub url: String,
    /// Query parameters
    pub query: Vec<(String, String)>,
    /// Request headers
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    /// Plain GET of `url`
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A successful response
#[derive(Clone, Debug)]
pub struct FetchResponse {
    /// Requested URL
    pub url: String,
    /// HTTP status
    pub status: u16,
    /// Body
    pub body: Bytes,
    /// Retries needed before this response arrived
    pub retries: u32,
}

impl FetchResponse {
    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        serde_json::from_slice(&self.body).map_err(|e| FetchError::Decode {
            url: self.url.clone(),
            reason: e.to_string(),
        })
    }
}

/// A request plus its retry bookkeeping
#[derive(Clone, Debug)]
pub struct FetchTask {
    /// The request
    pub request: FetchRequest,
    /// Attempt count and next backoff delay
    pub retry: RetryState,
    /// Give up (as a timeout) when this instant passes, retries included
    pub deadline: Option<Instant>,
}

impl FetchTask {
    /// Fresh task for `request`
    pub fn new(request: FetchRequest, retry: &RetryConfig) -> Self {
        Self {
            request,
            retry: RetryState::new(retry),
            deadline: None,
        }
    }

    /// Set an overall deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Abstraction over the HTTP exchange, enabling testability.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform one exchange; non-success statuses are returned as errors
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// Snapshot of fetcher counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    /// Exchanges started (each attempt counts)
    pub requests: u64,
    /// Retries performed
    pub retries: u64,
    /// Exchanges in flight right now
    pub active: usize,
    /// Highest number of simultaneous exchanges observed
    pub peak: usize,
}

#[derive(Debug, Default)]
struct StatsCounters {
    requests: AtomicU64,
    retries: AtomicU64,
    active: AtomicUsize,
    peak: AtomicUsize,
}

struct ActiveGuard<'a>(&'a StatsCounters);

impl<'a> ActiveGuard<'a> {
    fn enter(counters: &'a StatsCounters) -> Self {
        counters.requests.fetch_add(1, Ordering::Relaxed);
        let now = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Executes requests under the run's connection, retry and cancellation policy
pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    connections: Arc<Semaphore>,
    max_retries: u32,
    retry: RetryConfig,
    cancel: CancellationToken,
    counters: Arc<StatsCounters>,
}

impl Fetcher {
    /// Fetcher for a run configured by `config`
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: &NetworkConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            connections: Arc::new(Semaphore::new(config.max_connections.max(1))),
            max_retries: config.max_retries,
            retry: config.retry.clone(),
            cancel,
            counters: Arc::new(StatsCounters::default()),
        }
    }

    /// GET `request` with the run's default retry policy
    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        self.execute(FetchTask::new(request, &self.retry)).await
    }

    /// Execute a task to completion
    ///
    /// Transient failures are retried up to `max_retries` times. Each attempt holds a
    /// connection permit only while the exchange is in flight, not while backing off.
    pub async fn execute(&self, task: FetchTask) -> Result<FetchResponse, FetchError> {
        let FetchTask {
            request,
            mut retry,
            deadline,
        } = task;

        let outcome = {
            let work = async {
                let attempts = with_retry(self.max_retries, &self.retry, &mut retry, || {
                    self.attempt(&request)
                });
                match deadline {
                    Some(deadline) => tokio::time::timeout_at(deadline, attempts)
                        .await
                        .unwrap_or_else(|_| {
                            Err(FetchError::Timeout {
                                url: request.url.clone(),
                            })
                        }),
                    None => attempts.await,
                }
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
                result = work => result,
            }
        };

        self.counters
            .retries
            .fetch_add(u64::from(retry.attempt), Ordering::Relaxed);

        let mut response = outcome?;
        response.retries = retry.attempt;
        Ok(response)
    }

    async fn attempt(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let _permit = self
            .connections
            .acquire()
            .await
            .map_err(|_| FetchError::Cancelled)?;
        let _active = ActiveGuard::enter(&self.counters);

        tracing::debug!(url = %request.url, "Sending request");
        self.transport.send(request).await
    }

    /// Current counters
    pub fn stats(&self) -> FetchStats {
        FetchStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            active: self.counters.active.load(Ordering::SeqCst),
            peak: self.counters.peak.load(Ordering::SeqCst),
        }
    }

    /// Token that aborts this fetcher's requests
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
