use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

const MAX_LIMIT: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Compact {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub notes: String,
    pub archived: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub notes: String,
    pub completed: bool,
    pub projects: Vec<Compact>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub action: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub resource: Compact,
    pub parent: Option<Compact>,
}

#[derive(Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Deserialize)]
pub struct CreateProject {
    pub name: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub archived: Option<bool>,
}

#[derive(Deserialize)]
pub struct CreateTask {
    pub name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub projects: Vec<String>,
}

#[derive(Deserialize)]
pub struct PageParams {
    pub limit: Option<usize>,
    pub offset: Option<String>,
}

#[derive(Deserialize)]
pub struct EventParams {
    pub resource: String,
    pub sync: Option<String>,
}

/// One entry of the change log, keyed by the resource whose feed shows it.
#[derive(Clone, Debug)]
struct LoggedEvent {
    feed: String,
    event: Event,
}

#[derive(Default)]
pub struct Store {
    projects: Vec<Project>,
    tasks: Vec<Task>,
    log: Vec<LoggedEvent>,
    sync_tokens: HashMap<String, usize>,
}

impl Store {
    fn record(&mut self, feed: &str, action: &str, resource_type: &str, resource: Compact, parent: Option<Compact>) {
        self.log.push(LoggedEvent {
            feed: feed.to_string(),
            event: Event {
                action: action.to_string(),
                resource_type: resource_type.to_string(),
                resource,
                parent,
            },
        });
    }

    fn issue_token(&mut self) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sync_tokens.insert(token.clone(), self.log.len());
        token
    }
}

pub type Db = Arc<RwLock<Store>>;

/// JSON error in the API's `{"errors": [{"message": ..}]}` shape.
#[derive(Debug)]
pub struct ApiFailure(StatusCode, String);

impl ApiFailure {
    fn not_found(kind: &str, id: &str) -> Self {
        ApiFailure(StatusCode::NOT_FOUND, format!("{kind}: Unknown object: {id}"))
    }

    fn bad_request(message: impl Into<String>) -> Self {
        ApiFailure(StatusCode::BAD_REQUEST, message.into())
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "errors": [{ "message": self.1 }] }))).into_response()
    }
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/{id}/tasks", get(list_project_tasks))
        .route("/tasks", post(create_task))
        .route("/tasks/{id}", get(get_task))
        .route("/events", get(events))
        .route("/_admin/expire-sync", post(expire_sync))
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Slice `items` by `limit`/`offset`. Without a limit the whole collection
/// is returned and no `next_page` is advertised.
fn paginate<T: Serialize>(items: &[T], params: &PageParams, path: &str) -> Result<Json<Value>, ApiFailure> {
    let start = match params.offset.as_deref() {
        None => 0,
        Some(raw) => decode_offset(raw)
            .filter(|n| *n <= items.len())
            .ok_or_else(|| ApiFailure::bad_request("offset: Your pagination token is invalid"))?,
    };
    let limit = match params.limit {
        None => items.len().saturating_sub(start),
        Some(n) if (1..=MAX_LIMIT).contains(&n) => n,
        Some(_) => return Err(ApiFailure::bad_request("limit: Must be between 1 and 100")),
    };

    let end = (start + limit).min(items.len());
    let next_page = if params.limit.is_some() && end < items.len() {
        let offset = encode_offset(end);
        json!({
            "offset": offset,
            "path": format!("{path}?limit={limit}&offset={offset}"),
        })
    } else {
        Value::Null
    };

    Ok(Json(json!({ "data": &items[start..end], "next_page": next_page })))
}

fn encode_offset(index: usize) -> String {
    format!("off_{index:x}")
}

fn decode_offset(raw: &str) -> Option<usize> {
    usize::from_str_radix(raw.strip_prefix("off_")?, 16).ok()
}

async fn list_projects(State(db): State<Db>, Query(params): Query<PageParams>) -> Result<Json<Value>, ApiFailure> {
    let store = db.read().await;
    paginate(&store.projects, &params, "/projects")
}

async fn create_project(
    State(db): State<Db>,
    Json(input): Json<Envelope<CreateProject>>,
) -> (StatusCode, Json<Value>) {
    let project = Project {
        id: Uuid::new_v4().to_string(),
        name: input.data.name,
        notes: input.data.notes,
        archived: false,
    };
    let mut store = db.write().await;
    store.projects.push(project.clone());
    (StatusCode::CREATED, Json(json!({ "data": project })))
}

async fn get_project(State(db): State<Db>, Path(id): Path<String>) -> Result<Json<Value>, ApiFailure> {
    let store = db.read().await;
    store
        .projects
        .iter()
        .find(|p| p.id == id)
        .map(|p| Json(json!({ "data": p })))
        .ok_or_else(|| ApiFailure::not_found("project", &id))
}

async fn update_project(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(input): Json<Envelope<UpdateProject>>,
) -> Result<Json<Value>, ApiFailure> {
    let mut store = db.write().await;
    let project = store
        .projects
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or_else(|| ApiFailure::not_found("project", &id))?;
    if let Some(name) = input.data.name {
        project.name = name;
    }
    if let Some(notes) = input.data.notes {
        project.notes = notes;
    }
    if let Some(archived) = input.data.archived {
        project.archived = archived;
    }
    let project = project.clone();
    let compact = Compact {
        id: project.id.clone(),
        name: project.name.clone(),
    };
    store.record(&project.id, "changed", "project", compact, None);
    Ok(Json(json!({ "data": project })))
}

async fn delete_project(State(db): State<Db>, Path(id): Path<String>) -> Result<Json<Value>, ApiFailure> {
    let mut store = db.write().await;
    let before = store.projects.len();
    store.projects.retain(|p| p.id != id);
    if store.projects.len() == before {
        return Err(ApiFailure::not_found("project", &id));
    }
    Ok(Json(json!({ "data": {} })))
}

async fn list_project_tasks(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<Value>, ApiFailure> {
    let store = db.read().await;
    if !store.projects.iter().any(|p| p.id == id) {
        return Err(ApiFailure::not_found("project", &id));
    }
    let tasks: Vec<&Task> = store
        .tasks
        .iter()
        .filter(|t| t.projects.iter().any(|p| p.id == id))
        .collect();
    paginate(&tasks, &params, &format!("/projects/{id}/tasks"))
}

async fn create_task(
    State(db): State<Db>,
    Json(input): Json<Envelope<CreateTask>>,
) -> Result<(StatusCode, Json<Value>), ApiFailure> {
    let mut store = db.write().await;
    let mut projects = Vec::new();
    for id in &input.data.projects {
        let project = store
            .projects
            .iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| ApiFailure::not_found("project", id))?;
        projects.push(Compact {
            id: project.id.clone(),
            name: project.name.clone(),
        });
    }

    let task = Task {
        id: Uuid::new_v4().to_string(),
        name: input.data.name,
        notes: input.data.notes,
        completed: false,
        projects: projects.clone(),
    };
    let compact = Compact {
        id: task.id.clone(),
        name: task.name.clone(),
    };
    for project in projects {
        store.record(&project.id, "added", "task", compact.clone(), Some(project.clone()));
    }
    store.tasks.push(task.clone());
    Ok((StatusCode::CREATED, Json(json!({ "data": task }))))
}

async fn get_task(State(db): State<Db>, Path(id): Path<String>) -> Result<Json<Value>, ApiFailure> {
    let store = db.read().await;
    store
        .tasks
        .iter()
        .find(|t| t.id == id)
        .map(|t| Json(json!({ "data": t })))
        .ok_or_else(|| ApiFailure::not_found("task", &id))
}

/// Sync protocol: a missing or unknown token yields 412 with a fresh token;
/// a known token yields the events logged since it was issued.
async fn events(State(db): State<Db>, Query(params): Query<EventParams>) -> Response {
    let mut store = db.write().await;
    let position = params
        .sync
        .as_deref()
        .and_then(|token| store.sync_tokens.get(token).copied());

    let Some(position) = position else {
        let token = store.issue_token();
        let body = json!({
            "errors": [{ "message": "Sync token invalid or too old. If you are attempting to keep resources in sync, you must fetch the full dataset for this query now and use the new sync token for the next sync." }],
            "sync": token,
        });
        return (StatusCode::PRECONDITION_FAILED, Json(body)).into_response();
    };

    let data: Vec<Event> = store.log[position..]
        .iter()
        .filter(|e| e.feed == params.resource)
        .map(|e| e.event.clone())
        .collect();
    let token = store.issue_token();
    Json(json!({ "data": data, "sync": token, "has_more": false })).into_response()
}

async fn expire_sync(State(db): State<Db>) -> StatusCode {
    db.write().await.sync_tokens.clear();
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_roundtrip_and_reject_garbage() {
        assert_eq!(decode_offset(&encode_offset(42)), Some(42));
        assert_eq!(decode_offset("42"), None);
        assert_eq!(decode_offset("off_zz"), None);
    }

    #[test]
    fn create_task_defaults_optional_fields() {
        let input: Envelope<CreateTask> = serde_json::from_str(r#"{"data":{"name":"Write docs"}}"#).unwrap();
        assert_eq!(input.data.name, "Write docs");
        assert!(input.data.notes.is_empty());
        assert!(input.data.projects.is_empty());
    }

    #[test]
    fn create_project_rejects_missing_name() {
        let result: Result<Envelope<CreateProject>, _> = serde_json::from_str(r#"{"data":{"notes":"x"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn update_project_all_fields_optional() {
        let input: Envelope<UpdateProject> = serde_json::from_str(r#"{"data":{}}"#).unwrap();
        assert!(input.data.name.is_none());
        assert!(input.data.archived.is_none());
    }

    #[test]
    fn paginate_advertises_next_page_only_with_limit() {
        let items = vec![1, 2, 3];
        let all = paginate(&items, &PageParams { limit: None, offset: None }, "/x").unwrap();
        assert_eq!(all.0["data"], json!([1, 2, 3]));
        assert!(all.0["next_page"].is_null());

        let first = paginate(&items, &PageParams { limit: Some(2), offset: None }, "/x").unwrap();
        assert_eq!(first.0["data"], json!([1, 2]));
        assert_eq!(first.0["next_page"]["offset"], "off_2");
        assert_eq!(first.0["next_page"]["path"], "/x?limit=2&offset=off_2");

        let last = paginate(
            &items,
            &PageParams { limit: Some(2), offset: Some("off_2".to_string()) },
            "/x",
        )
        .unwrap();
        assert_eq!(last.0["data"], json!([3]));
        assert!(last.0["next_page"].is_null());
    }
}
