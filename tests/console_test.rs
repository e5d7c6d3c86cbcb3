use std::sync::{Arc, Mutex};

use axum::{response::IntoResponse, routing::get, Json, Router};
use clap::Parser;
use serde_json::json;
use tokio::sync::broadcast;

use console_client::CredentialStore;
use console_config::AppConfig;
use console_domain::ConsoleError;
use console_testing_utils::{ExecutionBuilder, JobBuilder, MemberBuilder, MockSchedulerApi};
use scheduler_console::{Application, CliApp, Commands};

struct Fixture {
    app: Application,
    api: MockSchedulerApi,
    _dir: tempfile::TempDir,
}

fn fixture(api: MockSchedulerApi) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.polling.interval_ms = 1000;
    config.preferences.path = dir.path().join("prefs.toml").to_string_lossy().into_owned();

    let app = Application::with_api(
        config,
        Arc::new(api.clone()),
        Arc::new(CredentialStore::new(None)),
    )
    .unwrap();
    Fixture { app, api, _dir: dir }
}

fn command(args: &[&str]) -> Commands {
    let mut argv = vec!["scheduler-console"];
    argv.extend_from_slice(args);
    CliApp::try_parse_from(argv).unwrap().command
}

fn fleet() -> MockSchedulerApi {
    let api = MockSchedulerApi::with_jobs(vec![
        JobBuilder::new("alpha-job").succeeded_at(100).build(),
        JobBuilder::new("beta-job").failed_at(200).build(),
        JobBuilder::new("gamma-job").build(),
    ]);
    let leader = MemberBuilder::new("node-1").with_addr("10.0.0.1", 8946).build();
    api.set_members(vec![leader.clone()]);
    api.set_leader(Some(leader));
    api
}

#[tokio::test(start_paused = true)]
async fn test_watch_renders_dashboard_until_tick_limit() {
    let fx = fixture(fleet());
    let args = match command(&["watch", "--ticks", "2"]) {
        Commands::Watch(args) => args,
        other => panic!("unexpected command: {other:?}"),
    };

    let (_tx, rx) = broadcast::channel(1);
    let mut frames = Vec::new();
    let applied = fx
        .app
        .watch(&args, rx, |frame| frames.push(frame.to_string()))
        .await
        .unwrap();

    assert_eq!(applied, 2);
    assert_eq!(frames.len(), 2);
    assert!(frames[0].contains("Leader: node-1"));
    assert!(frames[0].contains("alpha-job"));
    assert!(frames[0].contains("beta-job"));
    assert!(!fx.app.polling().is_running().await);
    assert_eq!(fx.api.call_count("list_jobs"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_watch_stops_on_shutdown_and_shows_failures() {
    let api = fleet();
    api.fail_always("list_jobs", ConsoleError::network_error("connection refused"));
    let fx = fixture(api);
    let args = match command(&["watch"]) {
        Commands::Watch(args) => args,
        other => panic!("unexpected command: {other:?}"),
    };

    let (tx, rx) = broadcast::channel(1);
    let frames = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&frames);

    let watch = fx.app.watch(&args, rx, move |frame| {
        let mut frames = sink.lock().unwrap();
        frames.push(frame.to_string());
        if frames.len() == 2 {
            let _ = tx.send(());
        }
    });
    let applied = watch.await.unwrap();

    assert_eq!(applied, 0);
    let frames = frames.lock().unwrap();
    assert!(frames.len() >= 2);
    assert!(frames[0].contains("上次刷新失败"));
    assert!(frames[0].contains("Leader: no leader"));
}

#[tokio::test]
async fn test_run_single_job_reports_notification() {
    let fx = fixture(fleet());

    let output = fx
        .app
        .execute(command(&["jobs", "run", "alpha-job"]))
        .await
        .unwrap();

    assert!(output.contains("Success running job: alpha-job"));
    assert_eq!(fx.api.call_count("run_job:alpha-job"), 1);
    // 成功后触发一次同步
    assert_eq!(fx.api.call_count("list_jobs"), 1);
}

#[tokio::test]
async fn test_bulk_toggle_reports_failed_items() {
    let fx = fixture(fleet());

    let err = fx
        .app
        .execute(command(&["jobs", "toggle", "alpha-job", "ghost", "beta-job"]))
        .await
        .unwrap_err();

    let report = err.to_string();
    assert!(report.contains("2 成功, 1 失败"));
    assert!(report.contains("ghost"));
    assert!(fx.api.job("alpha-job").unwrap().disabled);
    assert!(fx.api.job("beta-job").unwrap().disabled);
}

#[tokio::test]
async fn test_forced_delete_removes_job() {
    let fx = fixture(fleet());

    let output = fx
        .app
        .execute(command(&["jobs", "delete", "gamma-job", "--force"]))
        .await
        .unwrap();

    assert!(output.contains("Job deleted: gamma-job"));
    assert!(fx.api.job("gamma-job").is_none());
}

#[tokio::test]
async fn test_list_filters_by_derived_status() {
    let fx = fixture(fleet());

    let output = fx
        .app
        .execute(command(&["jobs", "list", "--status", "failed"]))
        .await
        .unwrap();

    assert!(output.contains("beta-job"));
    assert!(!output.contains("alpha-job"));
    assert!(output.contains("共 3 个任务"));
}

#[tokio::test]
async fn test_show_job_marks_running() {
    let api = fleet();
    api.set_busy(vec![ExecutionBuilder::new("gamma-job").build()]);
    let fx = fixture(api);

    let output = fx
        .app
        .execute(command(&["jobs", "show", "gamma-job"]))
        .await
        .unwrap();

    assert!(output.contains("名称: gamma-job"));
    assert!(output.contains("状态: running"));
}

#[tokio::test]
async fn test_save_rejects_invalid_definition() {
    let fx = fixture(fleet());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("job.json");
    std::fs::write(&path, r#"{"name": "bad name!", "schedule": "@hourly"}"#).unwrap();

    let result = fx
        .app
        .execute(command(&["jobs", "save", path.to_str().unwrap()]))
        .await;

    assert!(result.is_err());
    assert!(fx.api.calls_starting_with("upsert_job").is_empty());
}

#[tokio::test]
async fn test_leader_failure_prints_no_leader() {
    let api = fleet();
    api.set_leader(None);
    let fx = fixture(api);

    let output = fx.app.execute(command(&["leader"])).await.unwrap();
    assert_eq!(output.trim(), "Leader: no leader");

    let members = fx.app.execute(command(&["members"])).await.unwrap();
    assert!(members.contains("node-1"));
}

#[tokio::test]
async fn test_theme_is_persisted() {
    let fx = fixture(fleet());

    let output = fx.app.execute(command(&["theme"])).await.unwrap();
    assert!(output.contains("light"));

    fx.app.execute(command(&["theme", "dark"])).await.unwrap();
    let output = fx.app.execute(command(&["theme"])).await.unwrap();
    assert!(output.contains("dark"));
}

#[tokio::test]
async fn test_config_example_parses() {
    let fx = fixture(fleet());

    let example = fx.app.execute(command(&["config", "example"])).await.unwrap();
    let body: String = example
        .lines()
        .filter(|line| !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");
    assert!(AppConfig::from_toml(&body).is_ok());

    let validated = fx.app.execute(command(&["config", "validate"])).await.unwrap();
    assert!(validated.contains("配置有效"));
}

#[tokio::test]
async fn test_watch_is_not_a_one_shot_command() {
    let fx = fixture(fleet());
    assert!(fx.app.execute(command(&["watch"])).await.is_err());
}

async fn jobs() -> impl IntoResponse {
    (
        [("X-Total-Count", "0-2/5")],
        Json(json!([
            {"name": "remote-a", "schedule": "@hourly", "last_success": "2024-01-01T00:00:00Z"},
            {"name": "remote-b", "schedule": "@daily", "last_error": "2024-01-01T00:00:00Z"}
        ])),
    )
}

async fn busy() -> Json<serde_json::Value> {
    Json(json!([]))
}

#[tokio::test]
async fn test_list_jobs_against_http_scheduler() {
    let router = Router::new()
        .route("/v1/jobs", get(jobs))
        .route("/v1/busy", get(busy));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.api.base_url = format!("http://{addr}/v1");
    config.preferences.path = dir.path().join("prefs.toml").to_string_lossy().into_owned();
    let app = Application::new(config).unwrap();

    let output = app.execute(command(&["jobs", "list"])).await.unwrap();
    assert!(output.contains("remote-a"));
    assert!(output.contains("remote-b"));
    assert!(output.contains("共 5 个任务"));
}
