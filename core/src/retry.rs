//! Bounded retry around a single HTTP exchange.

use std::time::Duration;

use tracing::{debug, warn};

use crate::dispatcher::{Dispatcher, TransportFailure};
use crate::error::{is_retryable_status, Error, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::options::Options;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Attempt budget and backoff curve for one logical HTTP call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never zero.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: INITIAL_BACKOFF,
            max_backoff: MAX_BACKOFF,
        }
    }

    pub fn from_options(options: &Options) -> Result<Self> {
        Ok(Self::new(options.max_retries()?))
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    /// Delay after the given failed attempt (1-based): doubling, capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Send `request`, retrying connection failures, 5xx and 429.
    ///
    /// Any other response, whatever its status, is returned as `Ok` for the
    /// caller to interpret.
    pub async fn send(&self, dispatcher: &dyn Dispatcher, request: &HttpRequest) -> Result<HttpResponse> {
        let mut attempt = 0;
        let mut last_delay = Duration::ZERO;

        loop {
            attempt += 1;
            debug!(method = %request.method, url = %request.url, attempt, "dispatching request");

            let failure = match dispatcher.send(request.clone()).await {
                Ok(response) if !is_retryable_status(response.status) => return Ok(response),
                Ok(response) => Failure::Status(response),
                Err(e) => Failure::Transport(e),
            };

            if attempt >= self.max_attempts {
                warn!(url = %request.url, attempt, "retry budget exhausted");
                return Err(failure.into_error(attempt));
            }

            let mut delay = self.delay_for_attempt(attempt);
            if let Some(retry_after) = failure.retry_after() {
                delay = delay.max(retry_after);
            }
            delay = delay.max(last_delay);
            last_delay = delay;

            warn!(
                url = %request.url,
                attempt,
                reason = %failure,
                wait_ms = delay.as_millis() as u64,
                "transient failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

enum Failure {
    Status(HttpResponse),
    Transport(TransportFailure),
}

impl Failure {
    fn retry_after(&self) -> Option<Duration> {
        match self {
            Failure::Status(r) if r.status == 429 => r
                .header("retry-after")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
            _ => None,
        }
    }

    fn into_error(self, attempts: u32) -> Error {
        match self {
            Failure::Status(r) => Error::from_status(r.status, &r.body),
            Failure::Transport(e) => Error::Transport {
                attempts,
                message: e.message,
            },
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Status(r) => write!(f, "HTTP {}", r.status),
            Failure::Transport(e) => write!(f, "{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Sequence(Mutex<Vec<std::result::Result<HttpResponse, TransportFailure>>>);

    #[async_trait]
    impl Dispatcher for Sequence {
        async fn send(&self, _request: HttpRequest) -> std::result::Result<HttpResponse, TransportFailure> {
            self.0.lock().unwrap().remove(0)
        }
    }

    fn get() -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: "http://localhost/tasks".to_string(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(6), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_secs(30));
    }

    #[test]
    fn zero_budget_still_makes_one_attempt() {
        assert_eq!(RetryPolicy::new(0).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_returned_without_retry() {
        let dispatcher = Sequence(Mutex::new(vec![Ok(HttpResponse::new(404, "")), Ok(HttpResponse::new(200, ""))]));
        let response = RetryPolicy::new(3).send(&dispatcher, &get()).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(dispatcher.0.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_extends_the_wait() {
        let dispatcher = Sequence(Mutex::new(vec![
            Ok(HttpResponse::new(429, "").with_header("Retry-After", "10")),
            Ok(HttpResponse::new(200, "{}")),
        ]));
        let started = tokio::time::Instant::now();
        let response = RetryPolicy::new(2).send(&dispatcher, &get()).await.unwrap();
        assert_eq!(response.status, 200);
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_transport_failures_report_attempts() {
        let dispatcher = Sequence(Mutex::new(vec![
            Err(TransportFailure::new("connection refused")),
            Err(TransportFailure::new("connection refused")),
        ]));
        let err = RetryPolicy::new(2).send(&dispatcher, &get()).await.unwrap_err();
        assert!(matches!(err, Error::Transport { attempts: 2, .. }));
    }
}
