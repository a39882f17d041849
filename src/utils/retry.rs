//! Retry utilities for resilient API calls.
//!
//! Three strategies live here:
//!
//! - [`with_retry`]: exponential backoff on transient [`SourceError`]s
//! - [`with_fixed_attempts`]: a bounded loop with no backoff, for
//!   providers that either answer quickly or not at all
//! - [`send_with_backoff`]: HTTP 429 backoff that reports a typed
//!   [`ApiResult`] instead of failing, together with the waits it performed

use reqwest::{RequestBuilder, Response, StatusCode};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::sources::SourceError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum total time to spend on retries (including delays)
    pub max_total_time: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            max_total_time: Duration::from_secs(120),
        }
    }
}

/// Transient errors that should trigger a retry
#[derive(Debug, Clone, PartialEq)]
pub enum TransientError {
    /// Network connectivity issues
    Network,
    /// Rate limit exceeded (with optional retry-after seconds)
    RateLimit(Option<u64>),
    /// Service unavailable (503)
    ServiceUnavailable,
    /// Request timeout
    Timeout,
}

impl TransientError {
    /// Check if a SourceError represents a transient error
    pub fn from_source_error(err: &SourceError) -> Option<Self> {
        match err {
            SourceError::RateLimit => Some(TransientError::RateLimit(None)),
            SourceError::Network(_) => Some(TransientError::Network),
            SourceError::Api(msg) => {
                let msg_lower = msg.to_lowercase();
                if msg_lower.contains("timeout") {
                    Some(TransientError::Timeout)
                } else if msg_lower.contains("service unavailable")
                    || msg_lower.contains("temporarily unavailable")
                    || msg_lower.contains("503")
                {
                    Some(TransientError::ServiceUnavailable)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Lower bound on the wait before retrying after this error
    pub fn recommended_delay(&self) -> Duration {
        match self {
            TransientError::RateLimit(Some(seconds)) => Duration::from_secs(*seconds + 1),
            TransientError::RateLimit(None) => Duration::from_secs(3),
            TransientError::ServiceUnavailable => Duration::from_secs(2),
            TransientError::Timeout => Duration::from_secs(1),
            TransientError::Network => Duration::ZERO,
        }
    }
}

/// Execute an async operation, retrying transient failures with exponential backoff
///
/// Permanent errors are returned immediately. After `max_attempts` or once
/// `max_total_time` worth of delays has accumulated, the last error is returned.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut attempts = 0;
    let mut total_elapsed = Duration::ZERO;

    loop {
        attempts += 1;

        let error = match timeout(config.max_total_time, operation()).await {
            Ok(Ok(result)) => {
                if attempts > 1 {
                    tracing::info!(
                        "Operation succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Ok(Err(error)) => error,
            Err(_) => SourceError::Network("Operation timed out".to_string()),
        };

        let Some(transient) = TransientError::from_source_error(&error) else {
            return Err(error);
        };

        let exp_delay = config.initial_delay.as_secs_f64()
            * config.backoff_multiplier.powf(attempts as f64 - 1.0);
        let delay = Duration::from_secs_f64(exp_delay.min(config.max_delay.as_secs_f64()));
        let delay = std::cmp::max(delay, transient.recommended_delay());

        total_elapsed += delay;

        if attempts >= config.max_attempts || total_elapsed >= config.max_total_time {
            tracing::warn!(
                "Operation failed after {} attempts (total elapsed: {:?}): {}",
                attempts,
                total_elapsed,
                error
            );
            return Err(error);
        }

        tracing::debug!(
            "Transient error on attempt {}: {:?}, retrying in {:?}",
            attempts,
            transient,
            delay
        );
        sleep(delay).await;
    }
}

/// Run `operation` up to `attempts` times with no delay in between
///
/// Every failure except the last logs a "retrying" warning. The last error
/// is returned once all attempts are used.
pub async fn with_fixed_attempts<T, F, Fut>(
    attempts: u32,
    label: &str,
    mut operation: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let attempts = attempts.max(1);
    let mut tries = 0;

    loop {
        tries += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if tries >= attempts => {
                tracing::warn!("{} failed after {} attempts: {}", label, attempts, e);
                return Err(e);
            }
            Err(e) => {
                tracing::warn!("{} attempt {} failed: {}, retrying...", label, tries, e);
            }
        }
    }
}

/// Create a retry configuration for external APIs
pub fn api_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(30),
        backoff_multiplier: 2.0,
        max_total_time: Duration::from_secs(90),
    }
}

/// HTTP 429 backoff parameters
///
/// The wait before retry `n` (counting from zero) is `base_delay * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total number of requests sent before giving up
    pub max_attempts: u32,
    /// Wait before the first retry
    pub base_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl BackoffPolicy {
    /// Wait before the given retry (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Typed outcome of a rate-limited API call
///
/// Callers match on this before treating a response as data.
#[derive(Debug)]
pub enum ApiResult<T> {
    /// The request succeeded
    Ok(T),
    /// Every attempt was answered with HTTP 429
    RateLimited {
        /// Number of requests sent
        attempts: u32,
    },
    /// A non-429 error status
    HttpError {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },
    /// Transport or decoding failure
    GeneralError(String),
}

impl<T> ApiResult<T> {
    /// Whether the call succeeded
    pub fn is_ok(&self) -> bool {
        matches!(self, ApiResult::Ok(_))
    }

    /// Convert into a [`Result`], mapping each failure kind to a [`SourceError`]
    pub fn into_result(self) -> Result<T, SourceError> {
        match self {
            ApiResult::Ok(value) => Ok(value),
            ApiResult::RateLimited { .. } => Err(SourceError::RateLimit),
            ApiResult::HttpError { status: 404, message } => Err(SourceError::NotFound(message)),
            ApiResult::HttpError { status, message } => {
                Err(SourceError::Api(format!("HTTP {}: {}", status, message)))
            }
            ApiResult::GeneralError(message) => Err(SourceError::Network(message)),
        }
    }

    /// Apply `f` to a successful value
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResult<U> {
        match self {
            ApiResult::Ok(value) => ApiResult::Ok(f(value)),
            ApiResult::RateLimited { attempts } => ApiResult::RateLimited { attempts },
            ApiResult::HttpError { status, message } => ApiResult::HttpError { status, message },
            ApiResult::GeneralError(message) => ApiResult::GeneralError(message),
        }
    }
}

/// An [`ApiResult`] plus every backoff wait performed to obtain it
#[derive(Debug)]
pub struct BackoffOutcome<T> {
    /// What the call produced
    pub result: ApiResult<T>,
    /// Waits slept between attempts, in order
    pub waits: Vec<Duration>,
}

/// Send a request, backing off exponentially while the server answers 429
///
/// `build` is called once per attempt since a [`RequestBuilder`] is consumed
/// by sending it. Non-429 error statuses and transport failures end the loop
/// immediately.
pub async fn send_with_backoff<F>(policy: BackoffPolicy, mut build: F) -> BackoffOutcome<Response>
where
    F: FnMut() -> RequestBuilder,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut waits = Vec::new();
    let mut attempt = 0;

    loop {
        attempt += 1;

        let response = match build().send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Error requesting API: {}", e);
                return BackoffOutcome {
                    result: ApiResult::GeneralError(e.to_string()),
                    waits,
                };
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            if attempt >= max_attempts {
                tracing::error!("Rate limited (429) after {} attempts", attempt);
                return BackoffOutcome {
                    result: ApiResult::RateLimited { attempts: attempt },
                    waits,
                };
            }
            let wait = policy.delay_for(attempt - 1);
            tracing::warn!(
                "Rate limited (429). Waiting {:?} before retry {}/{}",
                wait,
                attempt,
                max_attempts - 1
            );
            sleep(wait).await;
            waits.push(wait);
            continue;
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .ok()
                .filter(|body| !body.trim().is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
            tracing::error!("HTTP error {} requesting API: {}", status, message);
            return BackoffOutcome {
                result: ApiResult::HttpError {
                    status: status.as_u16(),
                    message,
                },
                waits,
            };
        }

        return BackoffOutcome {
            result: ApiResult::Ok(response),
            waits,
        };
    }
}
