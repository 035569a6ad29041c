//! Structured error taxonomy (C1) and classifier (C2) — spec.md §4.2.
//!
//! The core speaks only in [`Error`]; adapters translate raw transport/upstream
//! failures into it via [`classify`] before returning to the manager.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Error taxonomy kinds (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Transient,
    Permanent,
    CircuitOpen,
    RateLimit,
    Auth,
    Validation,
    Timeout,
    Network,
    Resource,
    NotFound,
    Duplicate,
    Serialization,
    HealthCheck,
}

impl Kind {
    /// `retryable` defaults to true for these kinds, false otherwise
    /// (spec.md §4.2), absent an explicit override on the [`Error`].
    #[must_use]
    pub const fn default_retryable(self) -> bool {
        matches!(
            self,
            Self::Transient | Self::Timeout | Self::Network | Self::RateLimit
        )
    }

    /// HTTP mapping per spec.md §4.2.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Auth => 401,
            Self::NotFound => 404,
            Self::Duplicate => 409,
            Self::RateLimit => 429,
            Self::Timeout => 408,
            Self::Transient | Self::Network | Self::CircuitOpen => 503,
            Self::Resource => 507,
            Self::Permanent | Self::Serialization | Self::HealthCheck => 500,
        }
    }

    /// Kinds the retry executor is allowed to retry (spec.md §7).
    #[must_use]
    pub const fn is_retryable_kind(self) -> bool {
        matches!(
            self,
            Self::Transient | Self::Timeout | Self::Network | Self::RateLimit
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A fully classified error carrying everything the resilience substrate
/// needs to decide whether/how to retry, and everything an ingress layer
/// needs to render a response.
#[derive(Debug, Clone)]
pub struct Error {
    pub kind: Kind,
    /// Stable SCREAMING_SNAKE_CASE code, e.g. `"RATE_LIMIT_EXCEEDED"`.
    pub code: &'static str,
    pub message: String,
    pub component: &'static str,
    pub operation: String,
    pub details: HashMap<String, String>,
    /// Human-readable cause chain, most-recent first.
    pub causes: Vec<String>,
    pub request_id: Option<String>,
    pub user_id: Option<String>,
    retryable_override: Option<bool>,
}

impl Error {
    #[must_use]
    pub fn new(kind: Kind, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            component: "core",
            operation: String::new(),
            details: HashMap::new(),
            causes: Vec::new(),
            request_id: None,
            user_id: None,
            retryable_override: None,
        }
    }

    #[must_use]
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(
            Kind::Validation,
            "VALIDATION_FAILED",
            format!("{field}: {reason}"),
        )
        .with_detail("field", field)
    }

    #[must_use]
    pub fn circuit_open(provider: &str) -> Self {
        Self::new(
            Kind::CircuitOpen,
            "CIRCUIT_OPEN",
            format!("circuit breaker open for provider '{provider}'"),
        )
        .with_detail("provider", provider)
    }

    #[must_use]
    pub fn with_component(mut self, component: &'static str) -> Self {
        self.component = component;
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.causes.push(cause.to_string());
        self
    }

    #[must_use]
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable_override = Some(retryable);
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn retryable(&self) -> bool {
        self.retryable_override
            .unwrap_or_else(|| self.kind.default_retryable())
    }

    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }

    /// Parses `details["retry_after"]` as a duration, accepting a bare
    /// integer (seconds) or a `"<n>s"`/`"<n>ms"` suffix.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        let raw = self.details.get("retry_after")?;
        parse_retry_after(raw)
    }
}

fn parse_retry_after(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Some(ms) = raw.strip_suffix("ms") {
        return ms.trim().parse::<u64>().ok().map(Duration::from_millis);
    }
    if let Some(secs) = raw.strip_suffix('s') {
        return secs.trim().parse::<f64>().ok().map(Duration::from_secs_f64);
    }
    raw.parse::<u64>().ok().map(Duration::from_secs)
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.component, self.message)?;
        if !self.operation.is_empty() {
            write!(f, " (operation={})", self.operation)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Classifies a raw upstream failure into the taxonomy (spec.md §4.2).
/// Rules apply in order; first match wins. Already-classified errors pass
/// through unchanged (idempotence law, spec.md §8).
#[must_use]
pub fn classify(raw: &RawFailure) -> Error {
    if let RawFailure::Classified(e) = raw {
        return (**e).clone();
    }

    if let RawFailure::HttpStatus { status, body } = raw {
        return classify_http_status(*status, body.as_deref());
    }

    let message = match raw {
        RawFailure::Message(m) | RawFailure::Transport(m) => m.as_str(),
        RawFailure::HttpStatus { .. } | RawFailure::Classified(_) => unreachable!(),
    };
    classify_message(message)
}

fn classify_http_status(status: u16, body: Option<&str>) -> Error {
    let base = |kind: Kind, code: &'static str| {
        Error::new(kind, code, format!("upstream returned HTTP {status}"))
            .with_detail("status", status.to_string())
    };

    let mut err = match status {
        408 => base(Kind::Timeout, "UPSTREAM_TIMEOUT"),
        429 => base(Kind::RateLimit, "UPSTREAM_RATE_LIMITED"),
        401 | 403 => base(Kind::Auth, "UPSTREAM_AUTH_FAILED"),
        404 => base(Kind::NotFound, "UPSTREAM_NOT_FOUND"),
        409 => base(Kind::Duplicate, "UPSTREAM_DUPLICATE"),
        400..=499 => base(Kind::Permanent, "UPSTREAM_CLIENT_ERROR"),
        500..=599 => base(Kind::Transient, "UPSTREAM_SERVER_ERROR"),
        _ => base(Kind::Transient, "UPSTREAM_UNKNOWN_STATUS"),
    };

    if status == 429 {
        if let Some(retry_after) = body.and_then(extract_retry_after_from_body) {
            err = err.with_detail("retry_after", retry_after);
        }
    }

    err
}

fn extract_retry_after_from_body(body: &str) -> Option<String> {
    // Minimal convenience for adapters that stuff a JSON `{"retry_after": "..."}`
    // hint into the response body rather than a header.
    let marker = "\"retry_after\"";
    let idx = body.find(marker)?;
    let rest = &body[idx + marker.len()..];
    let colon = rest.find(':')?;
    let rest = rest[colon + 1..].trim_start();
    let rest = rest.trim_start_matches('"');
    let end = rest.find(['"', ',', '}']).unwrap_or(rest.len());
    Some(rest[..end].trim().to_string())
}

const TIMEOUT_SUBSTRINGS: &[&str] = &[
    "timeout",
    "timed out",
    "deadline exceeded",
    "context canceled",
    "connection reset",
];
const NETWORK_SUBSTRINGS: &[&str] = &[
    "connection refused",
    "no such host",
    "network unreachable",
    "broken pipe",
    "connection closed",
];
const RATE_LIMIT_SUBSTRINGS: &[&str] = &[
    "rate limit",
    "too many requests",
    "quota exceeded",
    "throttled",
];
const DATABASE_SUBSTRINGS: &[&str] = &["database", "sql", "deadlock", "constraint", "duplicate key"];

fn classify_message(message: &str) -> Error {
    let lower = message.to_lowercase();

    if contains_any(&lower, TIMEOUT_SUBSTRINGS) {
        return Error::new(Kind::Timeout, "TRANSPORT_TIMEOUT", message);
    }
    if contains_any(&lower, NETWORK_SUBSTRINGS) {
        return Error::new(Kind::Network, "TRANSPORT_NETWORK_ERROR", message);
    }
    if contains_any(&lower, RATE_LIMIT_SUBSTRINGS) {
        return Error::new(Kind::RateLimit, "TRANSPORT_RATE_LIMITED", message);
    }
    if contains_any(&lower, DATABASE_SUBSTRINGS) {
        return Error::new(Kind::Transient, "DATABASE_ERROR", message);
    }
    if lower.contains("insufficient credits") {
        // Upstream-specific refinement (spec.md §4.2 rule 4): a resource
        // exhaustion the caller cannot fix by retrying.
        return Error::new(Kind::Resource, "INSUFFICIENT_CREDITS", message).with_retryable(false);
    }

    // Conservative default: unknown errors are not blindly retried.
    Error::new(Kind::Transient, "UNCLASSIFIED", message).with_retryable(false)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Input to [`classify`]: the various shapes a raw upstream failure can take
/// before it has been translated into the taxonomy.
#[derive(Debug, Clone)]
pub enum RawFailure {
    /// An HTTP response with a non-2xx status and optional response body.
    HttpStatus { status: u16, body: Option<String> },
    /// A transport-level failure (connection error, DNS failure, ...).
    Transport(String),
    /// Any other message-bearing failure to pattern-match against.
    Message(String),
    /// Already classified — passed through unchanged.
    Classified(Box<Error>),
}

impl From<Error> for RawFailure {
    fn from(e: Error) -> Self {
        Self::Classified(Box::new(e))
    }
}

impl From<reqwest::Error> for RawFailure {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            Self::HttpStatus {
                status: status.as_u16(),
                body: None,
            }
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<Error> for anyhow::Error {
    fn from(e: Error) -> Self {
        anyhow::anyhow!(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_passthrough_is_idempotent() {
        let e = Error::new(Kind::Auth, "X", "m");
        let raw: RawFailure = e.clone().into();
        let classified = classify(&raw);
        assert_eq!(classified.kind, e.kind);

        // classify(classify(e)) kind == classify(e) kind (spec.md §8 law)
        let raw2: RawFailure = classified.clone().into();
        assert_eq!(classify(&raw2).kind, classified.kind);
    }

    #[test]
    fn classify_http_status_mapping() {
        assert_eq!(classify_http_status(408, None).kind, Kind::Timeout);
        assert_eq!(classify_http_status(429, None).kind, Kind::RateLimit);
        assert_eq!(classify_http_status(401, None).kind, Kind::Auth);
        assert_eq!(classify_http_status(403, None).kind, Kind::Auth);
        assert_eq!(classify_http_status(404, None).kind, Kind::NotFound);
        assert_eq!(classify_http_status(409, None).kind, Kind::Duplicate);
        assert_eq!(classify_http_status(422, None).kind, Kind::Permanent);
        assert_eq!(classify_http_status(500, None).kind, Kind::Transient);
        assert_eq!(classify_http_status(503, None).kind, Kind::Transient);
    }

    #[test]
    fn classify_rate_limit_extracts_retry_after_from_body() {
        let body = r#"{"error": "rate limit", "retry_after": "2s"}"#;
        let e = classify_http_status(429, Some(body));
        assert_eq!(e.retry_after(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn classify_message_substrings() {
        assert_eq!(classify_message("operation timed out").kind, Kind::Timeout);
        assert_eq!(
            classify_message("connection refused by host").kind,
            Kind::Network
        );
        assert_eq!(classify_message("Too Many Requests").kind, Kind::RateLimit);
        assert_eq!(
            classify_message("deadlock detected in database").kind,
            Kind::Transient
        );
    }

    #[test]
    fn classify_unknown_defaults_to_non_retryable_transient() {
        let e = classify_message("a wholly novel failure mode");
        assert_eq!(e.kind, Kind::Transient);
        assert!(!e.retryable());
    }

    #[test]
    fn classify_insufficient_credits_is_resource_non_retryable() {
        let e = classify_message("insufficient credits for this account");
        assert_eq!(e.kind, Kind::Resource);
        assert!(!e.retryable());
    }

    #[test]
    fn retryable_defaults_follow_kind_unless_overridden() {
        assert!(Error::new(Kind::Transient, "X", "m").retryable());
        assert!(!Error::new(Kind::Permanent, "X", "m").retryable());
        assert!(Error::new(Kind::Permanent, "X", "m")
            .with_retryable(true)
            .retryable());
    }

    #[test]
    fn retry_after_parses_seconds_and_milliseconds() {
        let e = Error::new(Kind::RateLimit, "X", "m").with_detail("retry_after", "500ms");
        assert_eq!(e.retry_after(), Some(Duration::from_millis(500)));

        let e = Error::new(Kind::RateLimit, "X", "m").with_detail("retry_after", "3");
        assert_eq!(e.retry_after(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn circuit_open_is_never_retryable() {
        let e = Error::circuit_open("arxiv");
        assert!(!e.kind.is_retryable_kind());
    }
}
