//! Request builder shared by item, collection and events requests.
//!
//! # Design
//! A `Request<T, K>` accumulates path, method, query, body fields and
//! per-request options. Every builder method consumes and returns the
//! request, and execution consumes it too, so two requests never share a
//! mutable map. `T` is the entity type the response decodes into; `K` is a
//! marker selecting how the response is interpreted:
//!
//! - [`kind::Item`]: one exchange, one entity (`execute`).
//! - [`kind::Collection`]: lazily paginated sequence (`paginate`).
//! - [`kind::Events`]: sync-token driven change feed (`open`).
//!
//! Options are copied from the client when the request is created.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::options::{render_query_value, Options, API_OPTIONS, QUERY_OPTIONS};
use crate::retry::RetryPolicy;

const USER_AGENT: &str = concat!("taskapi-rust/", env!("CARGO_PKG_VERSION"));

/// Response-interpretation markers.
pub mod kind {
    /// Single entity.
    #[derive(Debug, Clone, Copy)]
    pub struct Item;
    /// Paginated sequence of entities.
    #[derive(Debug, Clone, Copy)]
    pub struct Collection;
    /// Incremental change feed.
    #[derive(Debug, Clone, Copy)]
    pub struct Events;
}

pub type ItemRequest<T> = Request<T, kind::Item>;
pub type CollectionRequest<T> = Request<T, kind::Collection>;
pub type EventsRequest<T> = Request<T, kind::Events>;

pub struct Request<T, K> {
    dispatcher: Arc<dyn Dispatcher>,
    authorization: Option<String>,
    pub(crate) path: String,
    method: HttpMethod,
    pub(crate) query: Map<String, Value>,
    data: Map<String, Value>,
    content: Option<String>,
    pub(crate) options: Options,
    _marker: PhantomData<fn() -> (T, K)>,
}

impl<T, K> Clone for Request<T, K> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            authorization: self.authorization.clone(),
            path: self.path.clone(),
            method: self.method,
            query: self.query.clone(),
            data: self.data.clone(),
            content: self.content.clone(),
            options: self.options.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, K> fmt::Debug for Request<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("data", &self.data)
            .field("content", &self.content.as_ref().map(String::len))
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<T, K> Request<T, K> {
    pub(crate) fn new(
        dispatcher: Arc<dyn Dispatcher>,
        authorization: Option<String>,
        options: Options,
        method: HttpMethod,
        path: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            authorization,
            path: path.into(),
            method,
            query: Map::new(),
            data: Map::new(),
            content: None,
            options,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn query(&self) -> &Map<String, Value> {
        &self.query
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Merge several query parameters; later keys win.
    pub fn with_query_map<I, S, V>(mut self, query: I) -> Self
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Value>,
    {
        self.query
            .extend(query.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Merge several body fields; later keys win.
    pub fn with_data_map<I, S, V>(mut self, data: I) -> Self
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Value>,
    {
        self.data
            .extend(data.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Send `content` as the body verbatim. Takes precedence over any
    /// fields set with `with_data`.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Override one option for this request only.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.set(key, value);
        self
    }

    /// Query parameter on GET, body field otherwise.
    pub fn with_param(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if self.method == HttpMethod::Get {
            self.with_query(key, value)
        } else {
            self.with_data(key, value)
        }
    }

    pub fn with_fields<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<Value> = fields.into_iter().map(|f| Value::String(f.into())).collect();
        self.with_option("fields", fields)
    }

    pub fn with_expand<I, S>(self, expand: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let expand: Vec<Value> = expand.into_iter().map(|f| Value::String(f.into())).collect();
        self.with_option("expand", expand)
    }

    pub fn pretty(self) -> Self {
        self.with_option("pretty", true)
    }

    /// Build the transport request from the current state.
    ///
    /// GET requests receive the API options as `opt_<name>` and the query
    /// options verbatim, both read from the request's option map. An explicit
    /// query parameter of the same name replaces the injected one. The query
    /// map is sent for every method.
    pub fn materialize(&self) -> Result<HttpRequest> {
        let mut url = self.url()?;

        let mut pairs: Vec<(String, String)> = Vec::new();
        if self.method == HttpMethod::Get {
            let injected = API_OPTIONS
                .iter()
                .map(|key| (format!("opt_{key}"), *key))
                .chain(QUERY_OPTIONS.iter().map(|key| (key.to_string(), *key)));
            for (name, key) in injected {
                if self.query.contains_key(&name) {
                    continue;
                }
                if let Some(value) = self.options.get(key).and_then(render_query_value) {
                    pairs.push((name, value));
                }
            }
        }
        for (key, value) in &self.query {
            if let Some(value) = render_query_value(value) {
                pairs.push((key.clone(), value));
            }
        }
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }

        let mut headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("accept".to_string(), "application/json".to_string()),
            ("user-agent".to_string(), USER_AGENT.to_string()),
        ];
        if let Some(auth) = &self.authorization {
            headers.push(("authorization".to_string(), auth.clone()));
        }

        Ok(HttpRequest {
            method: self.method,
            url: url.into(),
            headers,
            body: self.body()?,
        })
    }

    /// Perform one retried exchange and return the raw response.
    pub async fn execute_raw(&self) -> Result<HttpResponse> {
        let request = self.materialize()?;
        let policy = RetryPolicy::from_options(&self.options)?;
        policy.send(self.dispatcher.as_ref(), &request).await
    }

    fn url(&self) -> Result<url::Url> {
        let base = self.options.base_url()?;
        let path = self.path.trim_start_matches('/');
        let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), path);
        url::Url::parse(&joined).map_err(|e| Error::invalid_option("base_url", e.to_string()))
    }

    fn body(&self) -> Result<String> {
        if let Some(content) = &self.content {
            return Ok(content.clone());
        }
        if self.data.is_empty() {
            return Ok(String::new());
        }
        let mut envelope = Map::new();
        envelope.insert("data".to_string(), Value::Object(self.data.clone()));
        serde_json::to_string(&envelope).map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[derive(Deserialize)]
struct ItemEnvelope<T> {
    data: T,
}

impl<T: DeserializeOwned> Request<T, kind::Item> {
    /// Execute once and decode the envelope's `data` object.
    #[instrument(skip(self), fields(method = %self.method, path = %self.path))]
    pub async fn execute(self) -> Result<T> {
        let response = self.execute_raw().await?;
        check_status(&response)?;
        decode::<ItemEnvelope<T>>(&response.body).map(|envelope| envelope.data)
    }
}

/// Map non-success status codes to `Error::Api`.
pub(crate) fn check_status(response: &HttpResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    Err(Error::from_status(response.status, &response.body))
}

pub(crate) fn decode<E: DeserializeOwned>(body: &str) -> Result<E> {
    serde_json::from_str(body).map_err(|e| Error::Decode {
        message: e.to_string(),
        body: body.to_string(),
    })
}
