//! The network boundary.
//!
//! # Design
//! Every HTTP exchange crosses the `Dispatcher` trait. The request pipeline
//! hands it a materialized `HttpRequest` and gets back an `HttpResponse` for
//! any status code, or a `TransportFailure` when no response was obtained.
//! Timeouts and cancellation of an in-flight exchange belong to the
//! dispatcher; the pipeline only counts attempts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use thiserror::Error;
use tracing::trace;

use crate::http::{HttpMethod, HttpRequest, HttpResponse};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A failure below HTTP: connection refused, reset, DNS, timeout.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportFailure {
    pub message: String,
}

impl TransportFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Sends one prepared request and returns the raw response.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure>;
}

/// Default dispatcher backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestDispatcher {
    inner: Client,
}

impl ReqwestDispatcher {
    pub fn new() -> Result<Self, TransportFailure> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportFailure> {
        let inner = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportFailure::new(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { inner })
    }

    /// Wrap an already configured `reqwest::Client`.
    pub fn from_client(inner: Client) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Dispatcher for ReqwestDispatcher {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        };

        let mut builder = self.inner.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .body(request.body)
            .send()
            .await
            .map_err(|e| TransportFailure::new(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| TransportFailure::new(format!("failed to read body: {e}")))?;

        trace!(status, bytes = body.len(), "response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
