//! Bounded retry with exponential backoff for provider calls
//!
//! **Algorithm:**
//! 1. Attempt operation
//! 2. If successful, return result
//! 3. On failure, classify the error:
//!    a. Quota exhausted or model unavailable: fail immediately with a tagged
//!       error, without consuming a retry
//!    b. Not retryable: return the error immediately
//!    c. Retries exhausted: log ERROR, return the last error
//!    d. Otherwise: log WARN, sleep, retry
//!
//! **Delay:**
//! - Server-specified delay (already buffered) when the error carries one
//! - Else `base * (rate_limited ? 3 : 1) * 2^attempt + jitter(0..1000ms)`,
//!   capped at `max_delay`

use super::error_classifier::{classify, ErrorClassification};
use crate::error::{CallError, ProviderError};
use chrono::Utc;
use icoach_common::config::RetrySettings;
use icoach_common::events::{EvaluationEvent, EventBus};
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Upper bound of the random jitter added to computed backoff
pub const MAX_JITTER: Duration = Duration::from_millis(1000);

/// Retry limits for one wrapped operation
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Human-readable label for diagnostics
    pub label: String,
    events: Option<EventBus>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("label", &self.label)
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(2000),
            max_delay: Duration::from_millis(30000),
            label: "provider call".to_string(),
            events: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn from_settings(settings: &RetrySettings, label: impl Into<String>) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            label: label.into(),
            events: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Same limits under a different label
    pub fn labeled(&self, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..self.clone()
        }
    }

    /// Publish `RetryScheduled` events for each scheduled retry
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }
}

/// Exponential backoff for `attempt` (0-based) with the given jitter
pub fn backoff_delay(
    policy: &RetryPolicy,
    attempt: u32,
    rate_limited: bool,
    jitter: Duration,
) -> Duration {
    let multiplier: u64 = if rate_limited { 3 } else { 1 };
    let exponential = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let base_ms = u64::try_from(policy.base_delay.as_millis()).unwrap_or(u64::MAX);
    let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);

    let delay_ms = base_ms
        .saturating_mul(multiplier)
        .saturating_mul(exponential)
        .saturating_add(jitter_ms);

    Duration::from_millis(delay_ms).min(policy.max_delay)
}

/// Delay before the next attempt
///
/// A server-specified delay is used as-is; it already includes the safety
/// buffer and is not capped.
pub fn compute_delay(
    policy: &RetryPolicy,
    attempt: u32,
    classification: &ErrorClassification,
) -> Duration {
    if let Some(server_delay) = classification.retry_delay {
        return server_delay;
    }

    let jitter_ms = rand::thread_rng().gen_range(0..MAX_JITTER.as_millis() as u64);
    backoff_delay(
        policy,
        attempt,
        classification.is_rate_limited,
        Duration::from_millis(jitter_ms),
    )
}

/// Run `operation` with bounded retries per `policy`
///
/// Returns the success value, a tagged terminal error
/// ([`CallError::QuotaExhausted`] / [`CallError::ModelDeprecated`]), or the
/// last provider error once retries are exhausted or ruled out.
pub async fn with_backoff<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T, CallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt: u32 = 0;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let classification = classify(&err);

        if classification.is_quota_exhausted {
            error!(
                label = %policy.label,
                attempt = attempt + 1,
                error = %err,
                "Provider quota exhausted, not retrying"
            );
            return Err(CallError::QuotaExhausted(format!(
                "daily API quota exhausted during {}; try again tomorrow ({})",
                policy.label, err.message
            )));
        }

        if classification.is_model_unavailable {
            error!(
                label = %policy.label,
                attempt = attempt + 1,
                error = %err,
                "Configured model unavailable, not retrying"
            );
            return Err(CallError::ModelDeprecated(format!(
                "model unavailable for {}: {}",
                policy.label, err.message
            )));
        }

        if !classification.is_retryable() {
            warn!(
                label = %policy.label,
                attempt = attempt + 1,
                kind = %classification.kind(),
                error = %err,
                "Provider call failed with non-retryable error"
            );
            return Err(CallError::Provider(err));
        }

        if attempt >= policy.max_retries {
            error!(
                label = %policy.label,
                attempts = attempt + 1,
                kind = %classification.kind(),
                error = %err,
                "Provider call failed after exhausting retries"
            );
            return Err(CallError::Provider(err));
        }

        let delay = compute_delay(policy, attempt, &classification);

        warn!(
            label = %policy.label,
            attempt = attempt + 1,
            max_attempts = policy.max_retries + 1,
            kind = %classification.kind(),
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Provider call failed, will retry after backoff"
        );

        if let Some(events) = &policy.events {
            events.emit_lossy(EvaluationEvent::RetryScheduled {
                label: policy.label.clone(),
                attempt: attempt + 1,
                delay_ms: delay.as_millis() as u64,
                classification: classification.kind().to_string(),
                timestamp: Utc::now(),
            });
        }

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
