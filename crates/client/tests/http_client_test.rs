use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use console_client::{CredentialStore, HttpSchedulerApi};
use console_domain::{ConsoleError, JobQuery, JobStatus, MemberStatus, SchedulerApi, SortOrder};

#[derive(Clone, Default)]
struct Recorded {
    calls: Arc<Mutex<Vec<String>>>,
    auth_headers: Arc<Mutex<Vec<Option<String>>>>,
    last_query: Arc<Mutex<HashMap<String, String>>>,
}

impl Recorded {
    fn record(&self, call: String, headers: &HeaderMap) {
        self.calls.lock().unwrap().push(call);
        self.auth_headers.lock().unwrap().push(
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        );
    }
}

async fn list_jobs(
    State(state): State<Recorded>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    state.record("GET /jobs".to_string(), &headers);
    *state.last_query.lock().unwrap() = query;
    (
        [("X-Total-Count", "0-1/2")],
        Json(json!([
            {"name": "a", "schedule": "@hourly", "last_success": "2024-01-01T00:00:00Z", "last_error": null},
            {"name": "b", "schedule": "@daily", "next": "0001-01-01T00:00:00Z"}
        ])),
    )
}

async fn run_job(
    State(state): State<Recorded>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> StatusCode {
    state.record(format!("POST /jobs/{name}"), &headers);
    match name.as_str() {
        "missing" => StatusCode::NOT_FOUND,
        "locked" => StatusCode::UNAUTHORIZED,
        _ => StatusCode::ACCEPTED,
    }
}

async fn get_job(State(state): State<Recorded>, headers: HeaderMap, Path(name): Path<String>) -> Json<Value> {
    state.record(format!("GET /jobs/{name}"), &headers);
    Json(json!({"name": name, "schedule": "@hourly", "disabled": true}))
}

async fn toggle_job(State(state): State<Recorded>, headers: HeaderMap, Path(name): Path<String>) -> StatusCode {
    state.record(format!("POST /jobs/{name}/toggle"), &headers);
    StatusCode::OK
}

async fn delete_job(State(state): State<Recorded>, headers: HeaderMap, Path(name): Path<String>) -> StatusCode {
    state.record(format!("DELETE /jobs/{name}"), &headers);
    StatusCode::OK
}

async fn upsert_job(State(state): State<Recorded>, headers: HeaderMap, Json(body): Json<Value>) -> StatusCode {
    state.record(format!("POST /jobs {}", body["name"].as_str().unwrap_or_default()), &headers);
    StatusCode::CREATED
}

async fn executions(
    State(state): State<Recorded>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.record(format!("GET /jobs/{name}/executions"), &headers);
    *state.last_query.lock().unwrap() = query;
    Json(json!([
        {"id": "1", "job_name": name, "group": 7, "started_at": "2024-01-01T00:00:00Z",
         "finished_at": "2024-01-01T00:00:05Z", "node_name": "n1", "success": true,
         "attempt": 1, "output": "trunc", "output_truncated": true}
    ]))
}

async fn execution(
    State(state): State<Recorded>,
    headers: HeaderMap,
    Path((name, id)): Path<(String, String)>,
) -> Json<Value> {
    state.record(format!("GET /jobs/{name}/executions/{id}"), &headers);
    Json(json!({"id": id, "job_name": name, "output": "full output", "output_truncated": false,
                "finished_at": "2024-01-01T00:00:05Z", "success": true}))
}

async fn busy() -> Json<Value> {
    Json(json!([{"id": "9", "job_name": "a", "started_at": "2024-01-01T00:00:00Z", "finished_at": null}]))
}

async fn members() -> Json<Value> {
    Json(json!([
        {"Name": "n1", "Addr": "10.0.0.1", "Port": 8946, "Tags": {"dc": "dc1"}, "Status": 1},
        {"Name": "n2", "Addr": "10.0.0.2", "Port": 8946, "Tags": null, "Status": 4}
    ]))
}

async fn leader() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "no leader elected")
}

async fn spawn_server() -> (String, Recorded) {
    let state = Recorded::default();
    let app = Router::new()
        .route("/v1/jobs", get(list_jobs).post(upsert_job))
        .route("/v1/jobs/{name}", get(get_job).post(run_job).delete(delete_job))
        .route("/v1/jobs/{name}/toggle", post(toggle_job))
        .route("/v1/jobs/{name}/executions", get(executions))
        .route("/v1/jobs/{name}/executions/{id}", get(execution))
        .route("/v1/busy", get(busy))
        .route("/v1/members", get(members))
        .route("/v1/leader", get(leader))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1"), state)
}

fn client(base_url: &str, token: Option<&str>) -> HttpSchedulerApi {
    HttpSchedulerApi::with_timeout(
        base_url,
        Duration::from_secs(5),
        Arc::new(CredentialStore::new(token.map(str::to_string))),
    )
    .unwrap()
}

#[tokio::test]
async fn test_list_jobs_reads_total_count_and_query() {
    let (base_url, state) = spawn_server().await;
    let api = client(&base_url, None);

    let query = JobQuery::new()
        .with_status(JobStatus::Failed)
        .sorted_by("name", SortOrder::Desc)
        .with_page(0, 2);
    let page = api.list_jobs(&query).await.unwrap();

    assert_eq!(page.jobs.len(), 2);
    assert_eq!(page.jobs[0].name, "a");
    assert!(page.jobs[1].next.is_none());
    let total = page.total.unwrap();
    assert_eq!(total.total, 2);
    assert_eq!(total.end, Some(1));

    let sent = state.last_query.lock().unwrap().clone();
    assert_eq!(sent.get("status").map(String::as_str), Some("failed"));
    assert_eq!(sent.get("_order").map(String::as_str), Some("DESC"));
    assert_eq!(sent.get("_end").map(String::as_str), Some("2"));
}

#[tokio::test]
async fn test_bearer_token_attached() {
    let (base_url, state) = spawn_server().await;
    let api = client(&base_url, Some("s3cret"));

    api.run_job("a").await.unwrap();

    let headers = state.auth_headers.lock().unwrap().clone();
    assert_eq!(headers, vec![Some("Bearer s3cret".to_string())]);
}

#[tokio::test]
async fn test_no_token_no_header() {
    let (base_url, state) = spawn_server().await;
    let api = client(&base_url, None);

    api.toggle_job("a").await.unwrap();

    let headers = state.auth_headers.lock().unwrap().clone();
    assert_eq!(headers, vec![None]);
    assert_eq!(state.calls.lock().unwrap()[0], "POST /jobs/a/toggle");
}

#[tokio::test]
async fn test_status_mapping() {
    let (base_url, _state) = spawn_server().await;
    let api = client(&base_url, None);

    let err = api.run_job("missing").await.unwrap_err();
    assert!(matches!(err, ConsoleError::Server { status: 404, .. }));

    let err = api.run_job("locked").await.unwrap_err();
    assert!(matches!(err, ConsoleError::Auth { status: 401 }));

    let err = api.leader().await.unwrap_err();
    match err {
        ConsoleError::Server { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "no leader elected");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_mutations_hit_expected_routes() {
    let (base_url, state) = spawn_server().await;
    let api = client(&base_url, None);

    api.delete_job("old").await.unwrap();
    api.upsert_job(&json!({"name": "new", "schedule": "@daily"}))
        .await
        .unwrap();
    let job = api.get_job("new").await.unwrap();
    assert!(job.disabled);

    let calls = state.calls.lock().unwrap().clone();
    assert_eq!(calls, vec!["DELETE /jobs/old", "POST /jobs new", "GET /jobs/new"]);
}

#[tokio::test]
async fn test_executions_and_lazy_output() {
    let (base_url, state) = spawn_server().await;
    let api = client(&base_url, None);

    let executions = api.list_executions("a", Some(100)).await.unwrap();
    assert_eq!(executions.len(), 1);
    assert!(executions[0].output_truncated);
    assert_eq!(
        state.last_query.lock().unwrap().get("output_size_limit").map(String::as_str),
        Some("100")
    );

    let full = api.get_execution("a", &executions[0].id).await.unwrap();
    assert_eq!(full.output, "full output");
    assert!(!full.output_truncated);
}

#[tokio::test]
async fn test_busy_and_members() {
    let (base_url, _state) = spawn_server().await;
    let api = client(&base_url, None);

    let busy = api.busy().await.unwrap();
    assert!(busy[0].is_running());

    let members = api.members().await.unwrap();
    assert_eq!(members[0].status, MemberStatus::Alive);
    assert_eq!(members[1].status, MemberStatus::Failed);
    assert!(members[1].tags.is_empty());
}
