//! Incremental change feed driven by an opaque sync token.
//!
//! # Design
//! An `EventStream` is either uninitialized (no token) or synced (holds the
//! token from the last response). The server signals both "token required"
//! and "token stale" with `412 Precondition Failed` and a fresh token in the
//! body; the two are told apart by whether the stream held a token when it
//! asked:
//!
//! | held token | response | outcome                                      |
//! |------------|----------|----------------------------------------------|
//! | none       | 412      | capture token, `EventBatch::SyncStarted`     |
//! | some       | 412      | drop token, `Error::SyncTokenExpired`        |
//! | any        | 200      | refresh token, `Changes` or `NotReady`       |
//!
//! Restarts after an expired token are left to the caller; nothing here
//! bounds them, since a feed is polled for as long as the caller wants.

use std::collections::VecDeque;

use futures::stream::{self, Stream};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::request::{check_status, decode, EventsRequest};

const PRECONDITION_FAILED: u16 = 412;

/// Outcome of a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventBatch<T> {
    /// New events, oldest first.
    Changes(Vec<T>),
    /// Nothing new yet; wait `poll_interval` before asking again.
    NotReady,
    /// The server issued the first token; poll again to start receiving.
    SyncStarted,
}

#[derive(Debug, Deserialize)]
struct EventsEnvelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    sync: Option<String>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct SyncRequired {
    #[serde(default)]
    sync: Option<String>,
}

impl<T: DeserializeOwned> EventsRequest<T> {
    /// Open the feed. A `sync` set on the request, as a query parameter or
    /// an option, resumes from that token instead of starting uninitialized.
    /// The stream owns the token from then on.
    pub fn open(mut self) -> EventStream<T> {
        let from_option = self.options.remove("sync");
        let from_query = self.query.remove("sync");
        let (sync, rejected) = match from_query.or(from_option) {
            None | Some(Value::Null) => (None, None),
            Some(Value::String(token)) => (Some(token), None),
            Some(Value::Number(n)) => (Some(n.to_string()), None),
            Some(other) => (None, Some(other.to_string())),
        };
        EventStream {
            request: self,
            sync,
            rejected,
            has_more: false,
        }
    }
}

pub struct EventStream<T> {
    request: EventsRequest<T>,
    sync: Option<String>,
    rejected: Option<String>,
    has_more: bool,
}

impl<T: DeserializeOwned> EventStream<T> {
    pub fn sync_token(&self) -> Option<&str> {
        self.sync.as_deref()
    }

    pub fn is_synced(&self) -> bool {
        self.sync.is_some()
    }

    /// True when the last response said more events are immediately available.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Forget the held token; the next poll starts a new sync.
    pub fn reset(&mut self) {
        self.sync = None;
        self.rejected = None;
        self.has_more = false;
    }

    /// Issue one request against the feed.
    pub async fn poll(&mut self) -> Result<EventBatch<T>> {
        if let Some(value) = &self.rejected {
            return Err(Error::invalid_option(
                "sync",
                format!("expected a string token, got {value}"),
            ));
        }

        let mut request = self.request.clone();
        if let Some(token) = &self.sync {
            request.options.set("sync", token.clone());
        }

        let response = request.execute_raw().await?;

        if response.status == PRECONDITION_FAILED {
            if self.sync.is_some() {
                info!(path = %self.request.path, "sync token expired");
                self.reset();
                return Err(Error::SyncTokenExpired);
            }
            let body: SyncRequired = decode(&response.body)?;
            let token = body.sync.ok_or_else(|| Error::Decode {
                message: "412 response without a sync token".to_string(),
                body: response.body.clone(),
            })?;
            debug!(path = %self.request.path, "sync established");
            self.sync = Some(token);
            self.has_more = false;
            return Ok(EventBatch::SyncStarted);
        }

        check_status(&response)?;
        let envelope: EventsEnvelope<T> = decode(&response.body)?;
        if let Some(token) = envelope.sync {
            self.sync = Some(token);
        }
        self.has_more = envelope.has_more;

        debug!(events = envelope.data.len(), has_more = self.has_more, "polled events");
        if envelope.data.is_empty() {
            Ok(EventBatch::NotReady)
        } else {
            Ok(EventBatch::Changes(envelope.data))
        }
    }

    /// Poll until at least one event arrives, sleeping `poll_interval`
    /// between empty polls. An expired token is returned as an error.
    ///
    /// `has_more` on an empty response is not trusted to skip the wait.
    pub async fn next_changes(&mut self) -> Result<Vec<T>> {
        let interval = self.request.options().poll_interval()?;
        loop {
            match self.poll().await? {
                EventBatch::Changes(events) => return Ok(events),
                EventBatch::SyncStarted => continue,
                EventBatch::NotReady => tokio::time::sleep(interval).await,
            }
        }
    }

    /// Endless stream of individual events. Ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> {
        stream::try_unfold((self, VecDeque::new()), |(mut feed, mut pending)| async move {
            if pending.is_empty() {
                pending.extend(feed.next_changes().await?);
            }
            Ok(pending.pop_front().map(|event| (event, (feed, pending))))
        })
    }
}

impl<T> std::fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("path", &self.request.path)
            .field("synced", &self.sync.is_some())
            .field("has_more", &self.has_more)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_defaults_missing_fields() {
        let env: EventsEnvelope<Value> = serde_json::from_str(r#"{"sync":"s2"}"#).unwrap();
        assert!(env.data.is_empty());
        assert_eq!(env.sync.as_deref(), Some("s2"));
        assert!(!env.has_more);
    }

    #[test]
    fn envelope_of_entities_without_default_decodes() {
        #[derive(Debug, Deserialize)]
        struct Change {
            action: String,
        }
        let env: EventsEnvelope<Change> =
            serde_json::from_str(r#"{"data":[{"action":"added"}],"sync":"s3","has_more":true}"#).unwrap();
        assert_eq!(env.data[0].action, "added");
        assert!(env.has_more);
    }

    #[test]
    fn sync_required_body_carries_token() {
        let body: SyncRequired = serde_json::from_str(
            r#"{"errors":[{"message":"Sync token invalid or too old"}],"sync":"fresh"}"#,
        )
        .unwrap();
        assert_eq!(body.sync.as_deref(), Some("fresh"));
    }
}
