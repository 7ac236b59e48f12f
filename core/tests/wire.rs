//! The reqwest dispatcher against a stub HTTP server.

use serde_json::json;
use taskapi_core::{Credential, Error, ReqwestDispatcher, TaskClient};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> TaskClient {
    TaskClient::with_dispatcher(ReqwestDispatcher::new().unwrap())
        .with_credential(Credential::Bearer("0/secret".to_string()))
        .with_option("base_url", server.uri())
}

#[tokio::test]
async fn get_carries_auth_and_injected_options() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/12"))
        .and(header("authorization", "Bearer 0/secret"))
        .and(header("accept", "application/json"))
        .and(query_param("opt_fields", "name,notes"))
        .and(query_param("opt_pretty", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": "12", "name": "Roadmap", "notes": "Q3" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let project = client_for(&server)
        .projects()
        .find_by_id("12")
        .with_fields(["name", "notes"])
        .pretty()
        .execute()
        .await
        .unwrap();

    assert_eq!(project.name, "Roadmap");
    assert_eq!(project.notes, "Q3");
}

#[tokio::test]
async fn put_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/tasks/5"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "data": { "completed": true } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": "5", "completed": true }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let task = client_for(&server)
        .tasks()
        .update("5")
        .with_data("completed", true)
        .execute()
        .await
        .unwrap();

    assert!(task.completed);
}

#[tokio::test]
async fn error_status_is_returned_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/tags/9"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "errors": [{ "message": "Forbidden" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).tags().delete("9").execute().await.unwrap_err();

    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "Forbidden");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn unavailable_then_ok_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": "1", "name": "Ada", "email": "ada@example.com" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let me = client_for(&server)
        .with_option("max_retries", 2)
        .users()
        .me()
        .execute()
        .await
        .unwrap();

    assert_eq!(me.email.as_deref(), Some("ada@example.com"));
}

#[tokio::test]
async fn rate_limited_request_honors_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "1", "name": "urgent" }],
            "next_page": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tags = client_for(&server).tags().find_all().execute().await.unwrap();

    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "urgent");
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let client = TaskClient::with_dispatcher(ReqwestDispatcher::new().unwrap())
        .with_option("base_url", "http://127.0.0.1:1")
        .with_option("max_retries", 1);

    let err = client.users().me().execute().await.unwrap_err();

    assert!(matches!(err, Error::Transport { attempts: 1, .. }), "got {err:?}");
}
