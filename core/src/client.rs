//! Entry point: dispatcher, options and credential.
//!
//! # Design
//! `TaskClient` is cheap to clone and holds no state that changes while
//! requests run. Each request copies the client's options when it is
//! created, so later changes to the client do not leak into requests that
//! already exist, and overrides on a request never reach the client.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::dispatcher::{Dispatcher, ReqwestDispatcher};
use crate::error::{Error, Result};
use crate::http::HttpMethod;
use crate::options::Options;
use crate::request::{CollectionRequest, EventsRequest, ItemRequest, Request};
use crate::resources::{Events, Projects, Tags, Tasks, Teams, Users, Webhooks, Workspaces};

/// Credential attached to every request as an `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// API key sent as the basic-auth user name with an empty password.
    Basic { api_key: String },
    /// Personal access token or OAuth access token.
    Bearer(String),
}

impl Credential {
    pub fn header_value(&self) -> String {
        match self {
            Credential::Basic { api_key } => format!("Basic {}", STANDARD.encode(format!("{api_key}:"))),
            Credential::Bearer(token) => format!("Bearer {token}"),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Basic { .. } => f.write_str("Credential::Basic(<redacted>)"),
            Credential::Bearer(_) => f.write_str("Credential::Bearer(<redacted>)"),
        }
    }
}

#[derive(Clone)]
pub struct TaskClient {
    dispatcher: Arc<dyn Dispatcher>,
    options: Options,
    credential: Option<Credential>,
}

impl TaskClient {
    /// Client over the default `reqwest` dispatcher with default options.
    pub fn new() -> Result<Self> {
        let dispatcher = ReqwestDispatcher::new().map_err(|e| Error::Transport {
            attempts: 0,
            message: e.message,
        })?;
        Ok(Self::with_dispatcher(dispatcher))
    }

    pub fn basic_auth(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self::new()?.with_credential(Credential::Basic {
            api_key: api_key.into(),
        }))
    }

    pub fn bearer(token: impl Into<String>) -> Result<Self> {
        Ok(Self::new()?.with_credential(Credential::Bearer(token.into())))
    }

    pub fn with_dispatcher(dispatcher: impl Dispatcher + 'static) -> Self {
        Self::from_shared(Arc::new(dispatcher))
    }

    pub fn from_shared(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            dispatcher,
            options: Options::default(),
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Set one client-wide option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.set(key, value);
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    /// Build a request from a method token. Unknown tokens fail with
    /// `Error::InvalidMethod`.
    pub fn request<T, K>(&self, method: &str, path: impl Into<String>) -> Result<Request<T, K>> {
        let method: HttpMethod = method.parse()?;
        Ok(self.build(method, path))
    }

    pub fn item<T>(&self, method: HttpMethod, path: impl Into<String>) -> ItemRequest<T> {
        self.build(method, path)
    }

    pub fn collection<T>(&self, path: impl Into<String>) -> CollectionRequest<T> {
        self.build(HttpMethod::Get, path)
    }

    /// Change feed for one resource (`GET /events?resource=<id>`).
    pub fn events<T>(&self, resource: impl Into<String>) -> EventsRequest<T> {
        let resource: String = resource.into();
        self.build(HttpMethod::Get, "/events").with_query("resource", resource)
    }

    pub fn projects(&self) -> Projects<'_> {
        Projects::new(self)
    }

    pub fn tasks(&self) -> Tasks<'_> {
        Tasks::new(self)
    }

    pub fn tags(&self) -> Tags<'_> {
        Tags::new(self)
    }

    pub fn teams(&self) -> Teams<'_> {
        Teams::new(self)
    }

    pub fn users(&self) -> Users<'_> {
        Users::new(self)
    }

    pub fn webhooks(&self) -> Webhooks<'_> {
        Webhooks::new(self)
    }

    pub fn workspaces(&self) -> Workspaces<'_> {
        Workspaces::new(self)
    }

    pub fn event_feeds(&self) -> Events<'_> {
        Events::new(self)
    }

    fn build<T, K>(&self, method: HttpMethod, path: impl Into<String>) -> Request<T, K> {
        Request::new(
            Arc::clone(&self.dispatcher),
            self.credential.as_ref().map(Credential::header_value),
            self.options.clone(),
            method,
            path,
        )
    }
}

impl fmt::Debug for TaskClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskClient")
            .field("options", &self.options)
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}
