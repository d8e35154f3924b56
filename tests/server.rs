//! HTTP server tests: the real router on a free port with in-process
//! collaborators, driven by reqwest.

mod common;

use base64::Engine;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

use common::{setup, FakeGitHub, ScriptedClassifier};
use github_user_store::commands::UserCommands;
use github_user_store::config::AuthConfig;
use github_user_store::intent::{Intent, IntentResolver};
use github_user_store::server::{router, AppState};
use tempfile::TempDir;

struct TestServer {
    base: String,
    handle: tokio::task::JoinHandle<()>,
    github: Arc<FakeGitHub>,
    commands: UserCommands,
    _tmp: TempDir,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start(auth: Option<AuthConfig>, classifier: Option<Intent>) -> TestServer {
    let (tmp, github, commands) = setup().await;
    let populate_path: PathBuf = tmp.path().join("users.json");

    let mut resolver = IntentResolver::new(commands.clone(), populate_path.clone());
    if let Some(intent) = classifier {
        resolver = resolver.with_classifier(ScriptedClassifier::new(intent));
    }
    let state = AppState::new(commands.clone(), resolver, auth, populate_path);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        handle,
        github,
        commands,
        _tmp: tmp,
    }
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn health_is_open() {
    let server = start(None, None).await;
    let resp = reqwest::get(format!("{}/health", server.base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_then_get_user() {
    let server = start(None, None).await;
    server
        .github
        .set_user("octocat", Some("San Francisco"), 10, &[&["JavaScript"], &["JavaScript", "Go"]]);
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/user", server.base))
        .json(&json!({ "username": "octocat" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "User octocat added successfully.");

    let resp = client
        .get(format!("{}/user/octocat", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["languages"], json!(["Go", "JavaScript"]));
    assert_eq!(body["location"], "San Francisco");
}

#[tokio::test]
async fn missing_username_is_400() {
    let server = start(None, None).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/user", server.base))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "validation_failed");
}

#[tokio::test]
async fn unknown_user_is_404() {
    let server = start(None, None).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/user/ghost", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "not_found");

    let resp = client
        .delete(format!("{}/user/ghost", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn duplicate_create_is_500_conflict() {
    let server = start(None, None).await;
    server.github.set_user("octocat", None, 1, &[]);
    server.commands.create("octocat").await.unwrap();

    let resp = reqwest::Client::new()
        .post(format!("{}/user", server.base))
        .json(&json!({ "username": "octocat" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "conflict");
}

#[tokio::test]
async fn users_query_filters_and_sorts() {
    let server = start(None, None).await;
    server.github.set_user("alice", Some("SF"), 10, &[&["Go"]]);
    server.github.set_user("carol", Some("SF"), 30, &[&["Go", "Rust"]]);
    server.github.set_user("bob", Some("SF"), 20, &[&["Python"]]);
    for name in ["alice", "carol", "bob"] {
        server.commands.create(name).await.unwrap();
    }

    let resp = reqwest::get(format!(
        "{}/users?location=SF&language=Go&sort=followers",
        server.base
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Vec<Value> = resp.json().await.unwrap();
    let names: Vec<&str> = body.iter().filter_map(|u| u["username"].as_str()).collect();
    assert_eq!(names, vec!["carol", "alice"]);
}

#[tokio::test]
async fn populate_route_loads_file() {
    let server = start(None, None).await;
    std::fs::write(
        server._tmp.path().join("users.json"),
        r#"[{"username": "p1"}, {"username": "p2", "languages": ["Go"]}]"#,
    )
    .unwrap();

    let resp = reqwest::Client::new()
        .post(format!("{}/populate", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn ai_text_dispatches_classified_intent() {
    let server = start(None, Some(Intent::new("get-users"))).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/ai/text", server.base))
        .json(&json!({ "text": "list everyone" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"]["type"], "users");
}

#[tokio::test]
async fn ai_unknown_action_is_500() {
    let server = start(None, Some(Intent::new("dance"))).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/ai/text", server.base))
        .json(&json!({ "text": "dance for me" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "unknown_action");
}

#[tokio::test]
async fn basic_auth_guards_everything_but_health() {
    let auth = AuthConfig {
        username: "admin".to_string(),
        password: "secret".to_string(),
    };
    let server = start(Some(auth), None).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/users", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("{}/users", server.base))
        .basic_auth("admin", Some("wrong"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let token = base64::engine::general_purpose::STANDARD.encode("admin:secret");
    let resp = client
        .get(format!("{}/users", server.base))
        .header("Authorization", format!("Basic {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn malformed_bodies_get_json_errors() {
    let server = start(None, Some(Intent::new("get-users"))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/user", server.base))
        .header("Content-Type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "validation_failed");

    let resp = client
        .put(format!("{}/user", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "validation_failed");

    let resp = client
        .post(format!("{}/ai/text", server.base))
        .body("list everyone")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "validation_failed");

    let resp = client
        .post(format!("{}/ai/voice", server.base))
        .json(&json!({ "file": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "validation_failed");
}
