//! Provider error classification
//!
//! Maps a raw [`ProviderError`] (optional status + free-text message) onto
//! the retry taxonomy used by the backoff retrier.
//!
//! PROVIDER COUPLING: every substring below mirrors wording the provider
//! currently uses in its error bodies. It is not a documented contract.
//! When the provider changes its messages, update the tables here and the
//! fixtures in the tests at the bottom of this file together.

use crate::error::ProviderError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::time::Duration;

/// Added to a server-suggested retry delay so we do not race the server's
/// own window
pub const RETRY_DELAY_BUFFER: Duration = Duration::from_secs(2);

/// Substrings marking rate limiting (retryable)
const RATE_LIMIT_MARKERS: &[&str] = &["RESOURCE_EXHAUSTED", "Too Many Requests", "rate limit"];

/// Substrings marking a temporarily unavailable service (retryable)
const UNAVAILABLE_MARKERS: &[&str] = &["UNAVAILABLE", "overloaded", "Service Unavailable"];

/// Substrings marking a zero-limit or daily-cap quota (terminal)
const QUOTA_MARKERS: &[&str] = &["limit: 0", "PerDay", "per day", "daily limit", "daily quota"];

/// Substrings marking a not-found response
const NOT_FOUND_MARKERS: &[&str] = &["NOT_FOUND", "not found"];

/// Wording that turns a not-found into a missing/deprecated model (terminal)
const MODEL_MARKERS: &[&str] = &["model", "deprecated", "is not supported", "no longer available"];

/// Wording of transient network/server conditions (retryable when nothing
/// more specific matched)
const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "network error",
    "connection reset",
];

/// RPC status names of transient server faults, matched case-sensitively
/// (lowercase "internal" is ordinary prose)
const TRANSIENT_STATUS_NAMES: &[&str] = &["INTERNAL"];

/// HTTP status codes quoted in message text, matched as whole numbers only
static STATUS_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[1-5]\d{2}\b").expect("valid status code regex"));

/// `"retryDelay": "30s"` as embedded in the provider's error details
static RETRY_DELAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""retryDelay"\s*:\s*"(\d+(?:\.\d+)?)s""#).expect("valid retryDelay regex")
});

/// Retry-relevant kind of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RateLimited,
    ServiceUnavailable,
    /// Terminal
    QuotaExhausted,
    /// Terminal
    ModelUnavailable,
    GenericRetryable,
    NonRetryable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::QuotaExhausted => "quota_exhausted",
            ErrorKind::ModelUnavailable => "model_unavailable",
            ErrorKind::GenericRetryable => "generic_retryable",
            ErrorKind::NonRetryable => "non_retryable",
        };
        f.write_str(name)
    }
}

/// Classification of one failed call
///
/// The four facets are independent: a 429 whose body names a daily cap is
/// both rate limited and quota exhausted. [`ErrorClassification::kind`]
/// resolves them with terminal facets taking precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassification {
    pub is_rate_limited: bool,
    pub is_service_unavailable: bool,
    pub is_quota_exhausted: bool,
    pub is_model_unavailable: bool,
    /// Generic text suggests a transient network/server condition
    pub is_transient: bool,
    /// Server-suggested delay, already including [`RETRY_DELAY_BUFFER`]
    pub retry_delay: Option<Duration>,
}

impl ErrorClassification {
    pub fn kind(&self) -> ErrorKind {
        if self.is_quota_exhausted {
            ErrorKind::QuotaExhausted
        } else if self.is_model_unavailable {
            ErrorKind::ModelUnavailable
        } else if self.is_rate_limited {
            ErrorKind::RateLimited
        } else if self.is_service_unavailable {
            ErrorKind::ServiceUnavailable
        } else if self.is_transient {
            ErrorKind::GenericRetryable
        } else {
            ErrorKind::NonRetryable
        }
    }

    /// Retrying cannot help
    pub fn is_terminal(&self) -> bool {
        self.is_quota_exhausted || self.is_model_unavailable
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RateLimited | ErrorKind::ServiceUnavailable | ErrorKind::GenericRetryable
        )
    }
}

fn contains_any_ci(haystack_lower: &str, needles: &[&str]) -> bool {
    needles
        .iter()
        .any(|n| haystack_lower.contains(&n.to_lowercase()))
}

/// Whether `message` quotes `code` as a standalone number ("HTTP 429",
/// `"code":429`), not as part of a longer one
fn mentions_status(message: &str, code: u16) -> bool {
    STATUS_CODE_RE
        .find_iter(message)
        .any(|m| m.as_str().parse::<u16>() == Ok(code))
}

/// Parse a server-suggested retry delay and add [`RETRY_DELAY_BUFFER`]
pub fn parse_retry_delay(message: &str) -> Option<Duration> {
    let captures = RETRY_DELAY_RE.captures(message)?;
    let seconds: f64 = captures.get(1)?.as_str().parse().ok()?;
    Some(Duration::from_secs_f64(seconds) + RETRY_DELAY_BUFFER)
}

/// Classify a failed provider call
pub fn classify(error: &ProviderError) -> ErrorClassification {
    let message = error.message.as_str();
    let lower = message.to_lowercase();
    let status = error.status;

    let is_status = |code: u16| status == Some(code) || mentions_status(message, code);

    let is_rate_limited = is_status(429) || contains_any_ci(&lower, RATE_LIMIT_MARKERS);
    let is_service_unavailable = is_status(503) || contains_any_ci(&lower, UNAVAILABLE_MARKERS);
    let is_quota_exhausted = contains_any_ci(&lower, QUOTA_MARKERS);

    let is_not_found = is_status(404) || contains_any_ci(&lower, NOT_FOUND_MARKERS);
    let is_model_unavailable = is_not_found && contains_any_ci(&lower, MODEL_MARKERS);

    let is_transient = status.map(|s| s >= 500).unwrap_or(false)
        || is_status(500)
        || is_status(503)
        || contains_any_ci(&lower, TRANSIENT_MARKERS)
        || TRANSIENT_STATUS_NAMES.iter().any(|name| message.contains(name));

    ErrorClassification {
        is_rate_limited,
        is_service_unavailable,
        is_quota_exhausted,
        is_model_unavailable,
        is_transient,
        retry_delay: parse_retry_delay(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(status: Option<u16>, message: &str) -> ProviderError {
        ProviderError::new(status, message)
    }

    #[test]
    fn test_429_status_is_rate_limited_not_quota() {
        let c = classify(&err(Some(429), "Too many requests, slow down"));
        assert!(c.is_rate_limited);
        assert!(!c.is_quota_exhausted);
        assert_eq!(c.kind(), ErrorKind::RateLimited);
        assert!(c.is_retryable());
        assert!(!c.is_terminal());
    }

    #[test]
    fn test_429_substring_without_status() {
        let c = classify(&err(None, "got HTTP 429 from upstream"));
        assert!(c.is_rate_limited);
        assert!(!c.is_quota_exhausted);
    }

    #[test]
    fn test_zero_limit_quota_is_terminal_even_with_429() {
        let message = r#"{"error":{"code":429,"message":"You exceeded your current quota. Quota exceeded for metric: generate_content_free_tier_requests, limit: 0","status":"RESOURCE_EXHAUSTED"}}"#;
        let c = classify(&err(Some(429), message));
        assert!(c.is_rate_limited);
        assert!(c.is_quota_exhausted);
        assert_eq!(c.kind(), ErrorKind::QuotaExhausted);
        assert!(c.is_terminal());
        assert!(!c.is_retryable());
    }

    #[test]
    fn test_daily_cap_quota_id() {
        let c = classify(&err(
            Some(429),
            "quotaId: GenerateRequestsPerDayPerProjectPerModel-FreeTier",
        ));
        assert!(c.is_quota_exhausted);
    }

    #[test]
    fn test_503_unavailable() {
        let c = classify(&err(Some(503), "The model is overloaded. Please try again later."));
        assert!(c.is_service_unavailable);
        assert_eq!(c.kind(), ErrorKind::ServiceUnavailable);
        assert!(c.is_retryable());
    }

    #[test]
    fn test_missing_model_is_terminal() {
        let c = classify(&err(
            Some(404),
            "models/gemini-1.0-pro is not found for API version v1beta, or is not supported for generateContent",
        ));
        assert!(c.is_model_unavailable);
        assert_eq!(c.kind(), ErrorKind::ModelUnavailable);
        assert!(c.is_terminal());
    }

    #[test]
    fn test_plain_404_is_not_model_unavailable() {
        let c = classify(&err(Some(404), "Requested entity was not found."));
        assert!(!c.is_model_unavailable);
        assert_eq!(c.kind(), ErrorKind::NonRetryable);
    }

    #[test]
    fn test_retry_delay_parsed_with_buffer() {
        let message = r#"{"details":[{"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay": "17s"}]}"#;
        let c = classify(&err(Some(429), message));
        assert_eq!(c.retry_delay, Some(Duration::from_secs(19)));
    }

    #[test]
    fn test_fractional_retry_delay() {
        assert_eq!(
            parse_retry_delay(r#""retryDelay":"1.5s""#),
            Some(Duration::from_millis(3500))
        );
        assert_eq!(parse_retry_delay("retry later"), None);
    }

    #[test]
    fn test_generic_transient_text_is_retryable() {
        for message in ["request timeout: deadline", "500 Internal error", "network error: reset"] {
            let c = classify(&err(None, message));
            assert_eq!(c.kind(), ErrorKind::GenericRetryable, "{}", message);
        }
    }

    #[test]
    fn test_status_codes_inside_other_numbers_do_not_match() {
        for message in [
            "internal field 'answer' exceeds 1500 characters",
            "request id 45031 rejected: invalid argument",
            "token 4290 is out of range",
        ] {
            let c = classify(&err(Some(400), message));
            assert!(!c.is_transient, "{}", message);
            assert!(!c.is_rate_limited, "{}", message);
            assert!(!c.is_service_unavailable, "{}", message);
            assert_eq!(c.kind(), ErrorKind::NonRetryable, "{}", message);
        }
    }

    #[test]
    fn test_internal_status_name_is_case_sensitive() {
        let c = classify(&err(None, r#"{"error":{"code":500,"status":"INTERNAL"}}"#));
        assert_eq!(c.kind(), ErrorKind::GenericRetryable);

        let c = classify(&err(None, "status: INTERNAL"));
        assert_eq!(c.kind(), ErrorKind::GenericRetryable);

        let c = classify(&err(Some(400), "the internal representation is invalid"));
        assert_eq!(c.kind(), ErrorKind::NonRetryable);
    }

    #[test]
    fn test_unknown_error_is_not_retryable() {
        let c = classify(&err(Some(400), "API key not valid. Please pass a valid API key."));
        assert_eq!(c.kind(), ErrorKind::NonRetryable);
        assert!(!c.is_retryable());
        assert!(!c.is_terminal());
    }
}
