//! Shared fixtures for the pipeline tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use taskapi_core::{Dispatcher, HttpRequest, HttpResponse, TaskClient, TransportFailure};

type Reply = Result<HttpResponse, TransportFailure>;

/// Dispatcher that replays a fixed script and records every request it sees.
/// Running past the end of the script is a transport failure.
#[derive(Default)]
pub struct ScriptedDispatcher {
    replies: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl ScriptedDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(self: &Arc<Self>, status: u16, body: Value) -> Arc<Self> {
        self.push(Ok(HttpResponse::new(status, body.to_string())))
    }

    pub fn reply_raw(self: &Arc<Self>, response: HttpResponse) -> Arc<Self> {
        self.push(Ok(response))
    }

    pub fn fail(self: &Arc<Self>, message: &str) -> Arc<Self> {
        self.push(Err(TransportFailure::new(message)))
    }

    fn push(self: &Arc<Self>, reply: Reply) -> Arc<Self> {
        self.replies.lock().unwrap().push_back(reply);
        Arc::clone(self)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn client(self: &Arc<Self>) -> TaskClient {
        TaskClient::from_shared(Arc::clone(self) as Arc<dyn Dispatcher>)
            .with_option("base_url", "https://api.test/1.0")
    }
}

#[async_trait]
impl Dispatcher for ScriptedDispatcher {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        self.seen.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportFailure::new("script exhausted")))
    }
}

/// Collection page body with ids `first..first + count`.
pub fn page(first: usize, count: usize, next: Option<&str>) -> Value {
    let data: Vec<Value> = (first..first + count)
        .map(|n| serde_json::json!({ "id": n.to_string(), "name": format!("task {n}") }))
        .collect();
    let next_page = match next {
        Some(offset) => serde_json::json!({
            "offset": offset,
            "path": format!("/projects/1/tasks?limit=50&offset={offset}"),
        }),
        None => Value::Null,
    };
    serde_json::json!({ "data": data, "next_page": next_page })
}

/// Value of query parameter `name` in a recorded request.
pub fn query_param(request: &HttpRequest, name: &str) -> Option<String> {
    request
        .query_pairs()
        .into_iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v)
}
