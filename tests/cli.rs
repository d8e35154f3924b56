//! End-to-end tests for the `ghu` binary. None of these reach the network.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ghu_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ghu");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/users.sqlite"

[github]
base_url = "http://127.0.0.1:9"

[server]
bind = "127.0.0.1:0"

[populate]
path = "{root}/populate/users.json"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("ghu.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ghu(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ghu_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("OPENAI_API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ghu binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn write_payload(root: &Path) -> PathBuf {
    let dir = root.join("populate");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("users.json");
    fs::write(
        &path,
        r#"[
  {"username": "alice", "location": "SF", "followers": 10, "languages": ["Go"]},
  {"username": "carol", "location": "SF", "followers": 30, "languages": ["Go", "Rust"]},
  {"username": "bob", "location": "NYC", "followers": 20, "languages": ["Python"]}
]"#,
    )
    .unwrap();
    path
}

#[test]
fn test_init_is_idempotent() {
    let (tmp, config) = setup_test_env();

    let (stdout, stderr, success) = run_ghu(&config, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully."));

    let (_, stderr, success) = run_ghu(&config, &["init"]);
    assert!(success, "second init failed: {}", stderr);
    assert!(tmp.path().join("data/users.sqlite").exists());
}

#[test]
fn test_get_users_empty() {
    let (_tmp, config) = setup_test_env();
    run_ghu(&config, &["init"]);

    let (stdout, stderr, success) = run_ghu(&config, &["get-users"]);
    assert!(success, "get-users failed: {}", stderr);
    assert!(stdout.contains("No users."));
}

#[test]
fn test_get_missing_user_fails() {
    let (_tmp, config) = setup_test_env();
    run_ghu(&config, &["init"]);

    let (_, stderr, success) = run_ghu(&config, &["get-user", "ghost"]);
    assert!(!success);
    assert!(stderr.contains("Error:"));
    assert!(stderr.contains("ghost"));
}

#[test]
fn test_populate_default_path_then_filter() {
    let (tmp, config) = setup_test_env();
    write_payload(tmp.path());

    let (stdout, stderr, success) = run_ghu(&config, &["populate"]);
    assert!(success, "populate failed: {}", stderr);
    assert!(stdout.contains("Loaded 3 users."));

    let (stdout, stderr, success) = run_ghu(
        &config,
        &["get-users", "--location", "SF", "--language", "Go", "--sort", "followers"],
    );
    assert!(success, "get-users failed: {}", stderr);
    let carol = stdout.find("--- carol ---").expect("carol listed");
    let alice = stdout.find("--- alice ---").expect("alice listed");
    assert!(carol < alice);
    assert!(!stdout.contains("--- bob ---"));
}

#[test]
fn test_populate_explicit_file_is_all_or_nothing() {
    let (tmp, config) = setup_test_env();
    let bad = tmp.path().join("bad.json");
    fs::write(
        &bad,
        r#"[{"username": "ok"}, {"username": "neg", "followers": -1}]"#,
    )
    .unwrap();

    let (_, stderr, success) = run_ghu(&config, &["populate", "--file", bad.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("Error:"));

    let (stdout, _, success) = run_ghu(&config, &["get-users"]);
    assert!(success);
    assert!(stdout.contains("No users."));
}

#[test]
fn test_delete_user() {
    let (tmp, config) = setup_test_env();
    write_payload(tmp.path());
    run_ghu(&config, &["populate"]);

    let (stdout, stderr, success) = run_ghu(&config, &["delete-user", "bob"]);
    assert!(success, "delete-user failed: {}", stderr);
    assert!(stdout.contains("User bob deleted successfully."));

    let (_, _, success) = run_ghu(&config, &["get-user", "bob"]);
    assert!(!success);
}

#[test]
fn test_ai_without_api_key_fails() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_ghu(&config, &["ai", "list", "all", "users"]);
    assert!(!success);
    assert!(stderr.contains("OPENAI_API_KEY"));
}
