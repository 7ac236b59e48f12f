//! Client and per-request options.
//!
//! # Design
//! Options are an open map of name to JSON value so that callers can set
//! API options (`fields`, `expand`, `pretty`) and query options (`limit`,
//! `offset`, `sync`) through the same channel as the client settings. Values
//! are not validated when set; the typed accessors validate on read, which
//! happens when a request executes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://app.asana.com/api/1.0";
pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_MAX_RETRIES: u64 = 5;
pub const DEFAULT_MAX_PAGES: u64 = 10_000;

/// Options sent as `opt_<name>` query parameters on GET requests.
pub const API_OPTIONS: [&str; 3] = ["pretty", "fields", "expand"];
/// Options sent verbatim as query parameters on GET requests.
pub const QUERY_OPTIONS: [&str; 3] = ["limit", "offset", "sync"];

const ENV_PREFIX: &str = "TASKAPI_";

/// An owned option map. Cloning yields an independent copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(Map<String, Value>);

impl Default for Options {
    fn default() -> Self {
        let mut map = Map::new();
        map.insert("base_url".into(), Value::from(DEFAULT_BASE_URL));
        map.insert("item_limit".into(), Value::from(-1));
        map.insert("page_size".into(), Value::from(DEFAULT_PAGE_SIZE));
        map.insert("poll_interval".into(), Value::from(DEFAULT_POLL_INTERVAL_SECS));
        map.insert("max_retries".into(), Value::from(DEFAULT_MAX_RETRIES));
        map.insert("max_pages".into(), Value::from(DEFAULT_MAX_PAGES));
        Self(map)
    }
}

impl Options {
    /// Defaults overridden by `TASKAPI_<KEY>` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let keys: Vec<String> = self.0.keys().cloned().collect();
        for key in keys {
            let var = format!("{ENV_PREFIX}{}", key.to_ascii_uppercase());
            if let Some(raw) = lookup(&var) {
                let value = serde_json::from_str::<serde_json::Number>(&raw)
                    .map(Value::Number)
                    .unwrap_or(Value::String(raw));
                self.0.insert(key, value);
            }
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn base_url(&self) -> Result<Url> {
        let raw = self
            .get("base_url")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid_option("base_url", "expected a string"))?;
        let url = Url::parse(raw).map_err(|e| Error::invalid_option("base_url", e.to_string()))?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(Error::invalid_option("base_url", "expected an http(s) URL"));
        }
        Ok(url)
    }

    /// Cap on entities yielded by a collection; `None` means unlimited (`-1`).
    pub fn item_limit(&self) -> Result<Option<usize>> {
        match self.get("item_limit") {
            None | Some(Value::Null) => Ok(None),
            Some(v) => match v.as_i64() {
                Some(-1) => Ok(None),
                Some(n) if n >= 0 => Ok(Some(n as usize)),
                _ => Err(Error::invalid_option("item_limit", "expected -1 or a non-negative integer")),
            },
        }
    }

    /// Caller-supplied `limit`, if any.
    pub fn limit(&self) -> Result<Option<usize>> {
        match self.get("limit") {
            None | Some(Value::Null) => Ok(None),
            Some(v) => parse_count(v)
                .map(Some)
                .ok_or_else(|| Error::invalid_option("limit", "expected a non-negative integer")),
        }
    }

    pub fn page_size(&self) -> Result<usize> {
        self.positive("page_size")
    }

    pub fn max_pages(&self) -> Result<usize> {
        self.positive("max_pages")
    }

    pub fn max_retries(&self) -> Result<u32> {
        self.get("max_retries")
            .and_then(parse_count)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| Error::invalid_option("max_retries", "expected a non-negative integer"))
    }

    pub fn poll_interval(&self) -> Result<Duration> {
        self.get("poll_interval")
            .and_then(|v| v.as_f64().or_else(|| v.as_str()?.parse().ok()))
            .filter(|secs| *secs >= 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .ok_or_else(|| Error::invalid_option("poll_interval", "expected non-negative seconds"))
    }

    fn positive(&self, key: &str) -> Result<usize> {
        self.get(key)
            .and_then(parse_count)
            .filter(|n| *n > 0)
            .ok_or_else(|| Error::invalid_option(key, "expected a positive integer"))
    }
}

/// Accepts JSON integers and numeric strings (environment overrides).
fn parse_count(v: &Value) -> Option<usize> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Render an option or query value the way the API expects it in a query
/// string. Arrays are comma-joined; `null` omits the parameter.
pub fn render_query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(render_query_value)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}
