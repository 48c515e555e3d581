//! Error types for the image API client.
//!
//! # Design
//! Every failure carries a human-readable message. The three HTTP-derived
//! variants (`Http`, `Server`, `Ratelimited`) additionally carry the numeric
//! status; `Ratelimited` also carries the parsed `x-ratelimit-*` headers.
//! Local validation failures and session-state failures never touch the
//! network, so they get their own variants.

use http::{HeaderMap, StatusCode};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by `Client` methods and `RequestHandle::execute`.
#[derive(Debug, Error)]
pub enum Error {
    /// An argument failed local validation before any I/O was attempted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The client is in a state that prevents the call: no open session, or
    /// an active ratelimit window.
    #[error("{message}")]
    Client { message: String },

    /// The server returned a non-2xx status that is neither 429 nor 5xx.
    #[error(transparent)]
    Http(HttpError),

    /// The server returned a 5xx status.
    #[error(transparent)]
    Server(HttpError),

    /// The server returned 429.
    #[error(transparent)]
    Ratelimited(RatelimitError),

    /// The session failed to deliver the request or read the response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn client(message: impl Into<String>) -> Self {
        Error::Client {
            message: message.into(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Numeric HTTP status, present only for errors derived from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http(e) | Error::Server(e) => Some(e.status),
            Error::Ratelimited(e) => Some(e.status),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Error::InvalidArgument(msg) => msg.clone(),
            Error::Client { message } => message.clone(),
            Error::Http(e) | Error::Server(e) => e.message.clone(),
            Error::Ratelimited(e) => e.message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_ratelimited(&self) -> bool {
        matches!(self, Error::Ratelimited(_))
    }
}

/// A non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTTP {status}: {message}")]
pub struct HttpError {
    pub status: u16,
    pub message: String,
}

/// A 429 response, with the ratelimit headers parsed.
///
/// Each header falls back to `-1` independently when it is missing or not a
/// number. A reset of `nan` or `inf` counts as not a number.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("HTTP {status}: {message} (resets in {reset}s)")]
pub struct RatelimitError {
    pub status: u16,
    pub message: String,
    /// Seconds until the window clears.
    pub reset: f64,
    pub limit: i64,
    pub remaining: i64,
}

impl RatelimitError {
    pub fn from_headers(status: u16, message: impl Into<String>, headers: &HeaderMap) -> Self {
        Self {
            status,
            message: message.into(),
            reset: header_number::<f64>(headers, "x-ratelimit-reset")
                .filter(|reset| reset.is_finite())
                .unwrap_or(-1.0),
            limit: header_number(headers, "x-ratelimit-limit").unwrap_or(-1),
            remaining: header_number(headers, "x-ratelimit-remaining").unwrap_or(-1),
        }
    }
}

/// Failures below HTTP: the request never produced a response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("session is closed")]
    Closed,

    /// The session needs a Tokio runtime and was polled outside one.
    #[error("no Tokio runtime is running")]
    NoRuntime,

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// `HeaderMap` lookups are case-insensitive, so `X-RateLimit-Reset` matches.
fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// Best-effort human text for an error response.
///
/// The API answers 404s with `{"detail": ...}` and other errors with
/// `{"message": ...}`; anything else falls back to the reason phrase.
pub(crate) fn response_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        for key in ["message", "detail"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    status.canonical_reason().unwrap_or("Unknown").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn ratelimit_headers_are_parsed() {
        let h = headers(&[
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-reset", "12.5"),
            ("x-ratelimit-limit", "30"),
        ]);
        let err = RatelimitError::from_headers(429, "Too Many Requests", &h);
        assert_eq!(err.remaining, 0);
        assert_eq!(err.reset, 12.5);
        assert_eq!(err.limit, 30);
    }

    #[test]
    fn ratelimit_header_lookup_ignores_case() {
        let mut h = HeaderMap::new();
        h.insert(
            http::HeaderName::from_bytes(b"X-RateLimit-Reset").unwrap(),
            HeaderValue::from_static("3"),
        );
        let err = RatelimitError::from_headers(429, "", &h);
        assert_eq!(err.reset, 3.0);
    }

    #[test]
    fn missing_or_malformed_headers_fall_back_to_sentinels() {
        let h = headers(&[("x-ratelimit-limit", "lots")]);
        let err = RatelimitError::from_headers(429, "", &h);
        assert_eq!(err.reset, -1.0);
        assert_eq!(err.limit, -1);
        assert_eq!(err.remaining, -1);

        for reset in ["nan", "NaN", "inf", "-infinity"] {
            let h = headers(&[("x-ratelimit-reset", reset), ("x-ratelimit-limit", "5")]);
            let err = RatelimitError::from_headers(429, "", &h);
            assert_eq!(err.reset, -1.0, "{reset}");
            assert_eq!(err.limit, 5);
        }
    }

    #[test]
    fn status_is_exposed_only_for_http_errors() {
        let http = Error::Http(HttpError {
            status: 404,
            message: "Not Found".into(),
        });
        assert_eq!(http.status(), Some(404));
        assert_eq!(Error::client("no session").status(), None);
        assert_eq!(Error::invalid("bad").status(), None);
    }

    #[test]
    fn message_is_always_present() {
        assert_eq!(Error::client("no session").message(), "no session");
        assert_eq!(Error::invalid("speed cannot be <= 0").message(), "speed cannot be <= 0");
        let server = Error::Server(HttpError {
            status: 503,
            message: "Service Unavailable".into(),
        });
        assert_eq!(server.message(), "Service Unavailable");
        assert_eq!(server.to_string(), "HTTP 503: Service Unavailable");
    }

    #[test]
    fn response_message_prefers_json_fields() {
        assert_eq!(
            response_message(StatusCode::NOT_FOUND, br#"{"detail":"Not Found"}"#),
            "Not Found"
        );
        assert_eq!(
            response_message(StatusCode::BAD_REQUEST, br#"{"message":"bad image"}"#),
            "bad image"
        );
        assert_eq!(response_message(StatusCode::BAD_REQUEST, b"oops"), "Bad Request");
    }

    #[test]
    fn response_message_without_reason_is_unknown() {
        let status = StatusCode::from_u16(599).unwrap();
        assert_eq!(response_message(status, b""), "Unknown");
    }
}
