//! Error types for the task API client.
//!
//! # Design
//! Retryable conditions (connection failures, 5xx, 429) never reach the
//! caller unless the retry budget runs out. Everything else is terminal for
//! the operation that produced it. End of a collection is not an error:
//! iteration simply returns `None`.

use thiserror::Error;

/// Errors returned while building or executing a request.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP method token is not one of GET, POST, PUT, DELETE.
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// The response body does not have the shape of the expected entity.
    #[error("failed to decode response: {message}")]
    Decode { message: String, body: String },

    /// The server answered with a status the retry policy did not absorb.
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The dispatcher could not complete the exchange, retries exhausted.
    #[error("transport failed after {attempts} attempt(s): {message}")]
    Transport { attempts: u32, message: String },

    /// The page chain repeated a cursor or exceeded the page bound.
    #[error("pagination aborted: {0}")]
    Pagination(String),

    /// The server rejected the held sync token; the event stream restarted.
    #[error("sync token expired, event stream must be restarted")]
    SyncTokenExpired,

    /// A client or request option holds a value unusable at execute time.
    #[error("invalid option `{key}`: {reason}")]
    InvalidOption { key: String, reason: String },

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status: 404, .. })
    }

    /// True for the statuses the retry policy retries.
    pub fn is_retryable_status(&self) -> bool {
        matches!(self, Error::Api { status, .. } if is_retryable_status(*status))
    }

    pub(crate) fn invalid_option(key: &str, reason: impl Into<String>) -> Self {
        Error::InvalidOption {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Build an `Api` error from a response, preferring the server's
    /// `errors[0].message` over the raw body.
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        Error::Api {
            status,
            message: error_message(body),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("errors")?
                .get(0)?
                .get("message")?
                .as_str()
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_prefers_server_message() {
        let err = Error::from_status(404, r#"{"errors":[{"message":"project: Unknown object"}]}"#);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "HTTP 404: project: Unknown object");
    }

    #[test]
    fn api_error_falls_back_to_raw_body() {
        let err = Error::from_status(502, "Bad Gateway");
        assert!(err.is_retryable_status());
        assert!(matches!(err, Error::Api { ref message, .. } if message == "Bad Gateway"));
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(402));
        assert!(!is_retryable_status(412));
    }
}
