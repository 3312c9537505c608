// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry with jittered exponential backoff for host cluster API calls.
//!
//! Status writes, finalizer patches and control plane lookups retry transient errors
//! (429, 5xx, transport). The override engine itself never retries: a failed object
//! is reported in status and picked up by the next reconciliation.

use anyhow::Result;
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Maximum total time to spend retrying one call (30 seconds)
const MAX_ELAPSED_TIME_SECS: u64 = 30;

/// Initial retry interval (100ms)
const INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Maximum interval between retries (5 seconds)
const MAX_INTERVAL_SECS: u64 = 5;

/// Backoff multiplier
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Exponential backoff with jitter.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Interval returned by the next call to [`ExponentialBackoff::next_backoff`], before jitter
    pub current_interval: Duration,
    /// Interval of the first retry
    pub initial_interval: Duration,
    /// Upper bound of a single interval
    pub max_interval: Duration,
    /// Upper bound of the total time spent retrying
    pub max_elapsed_time: Option<Duration>,
    /// Growth factor between consecutive intervals
    pub multiplier: f64,
    /// Relative jitter applied to every interval
    pub randomization_factor: f64,
    start_time: Instant,
}

impl ExponentialBackoff {
    fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier,
            randomization_factor,
            start_time: Instant::now(),
        }
    }

    /// Get the next backoff interval, or `None` once the elapsed time budget is spent.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self
            .max_elapsed_time
            .is_some_and(|max| self.start_time.elapsed() >= max)
        {
            return None;
        }

        let interval = self.current_interval;
        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(self.apply_jitter(interval))
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let jittered = rand::rng().random_range((secs - delta)..=(secs + delta));

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Backoff used for host cluster API calls.
///
/// Retries at roughly 100ms, 200ms, 400ms, 800ms, 1.6s, 3.2s and then every 5s until
/// 30 seconds have elapsed.
#[must_use]
pub fn default_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(MAX_INTERVAL_SECS),
        Some(Duration::from_secs(MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Retry a Kubernetes API call with exponential backoff.
///
/// Transient errors (HTTP 429, 5xx, transport) are retried; anything else fails
/// immediately.
///
/// # Errors
///
/// Returns the last error once it is not retryable or the backoff is exhausted.
///
/// # Example
///
/// ```no_run
/// use kube::{Api, Client};
/// use spaces::crd::ControlPlane;
/// use spaces::reconcilers::retry::retry_api_call;
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = Client::try_default().await?;
/// let api: Api<ControlPlane> = Api::namespaced(client, "default");
///
/// let ctp = retry_api_call(|| api.get("ctp1"), "get ControlPlane default/ctp1").await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_api_call<T, F, Fut>(mut operation: F, operation_name: &str) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, kube::Error>>,
{
    let mut backoff = default_backoff();
    let mut attempt = 0;

    loop {
        attempt += 1;

        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt,
                        "Kubernetes API call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !is_retryable_error(&err) {
            debug!(
                operation = operation_name,
                error = %err,
                "Non-retryable Kubernetes API error"
            );
            return Err(err.into());
        }

        let Some(delay) = backoff.next_backoff() else {
            error!(
                operation = operation_name,
                attempt,
                error = %err,
                "Backoff exhausted, giving up"
            );
            return Err(anyhow::anyhow!(
                "{operation_name} failed after {attempt} attempts: {err}"
            ));
        };

        warn!(
            operation = operation_name,
            attempt,
            retry_after = ?delay,
            error = %err,
            "Retryable Kubernetes API error, will retry"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Whether a Kubernetes error is transient.
fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(status) => status.code == 429 || (500..600).contains(&status.code),
        kube::Error::Service(_) => true,
        _ => false,
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
