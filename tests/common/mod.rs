//! Shared fixtures: an in-process profile source, a temporary SQLite store
//! and a scripted classifier.

#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use github_user_store::classifier::{Classifier, Transcriber};
use github_user_store::commands::UserCommands;
use github_user_store::error::{CommandError, CommandResult};
use github_user_store::github::ProfileSource;
use github_user_store::intent::Intent;
use github_user_store::migrate::create_schema;
use github_user_store::models::GitHubProfile;
use github_user_store::store::SqliteUserStore;

/// Profile source backed by a map of username → (profile, per-repo languages).
#[derive(Default)]
pub struct FakeGitHub {
    users: Mutex<HashMap<String, (GitHubProfile, Vec<Vec<String>>)>>,
    pub profile_calls: AtomicUsize,
}

impl FakeGitHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers (or replaces) a user with one language list per repository.
    pub fn set_user(&self, username: &str, location: Option<&str>, followers: i64, repos: &[&[&str]]) {
        let profile = GitHubProfile {
            name: Some(format!("{} name", username)),
            bio: None,
            location: location.map(str::to_string),
            company: None,
            followers: Some(followers),
            following: Some(0),
            repos_url: format!("fake://{}/repos", username),
        };
        let repos = repos
            .iter()
            .map(|langs| langs.iter().map(|l| l.to_string()).collect())
            .collect();
        self.users
            .lock()
            .unwrap()
            .insert(username.to_string(), (profile, repos));
    }

    pub fn calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    fn owner(url: &str) -> String {
        url.trim_start_matches("fake://")
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait]
impl ProfileSource for FakeGitHub {
    async fn fetch_profile(&self, username: &str) -> CommandResult<GitHubProfile> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.users
            .lock()
            .unwrap()
            .get(username)
            .map(|(profile, _)| profile.clone())
            .ok_or_else(|| CommandError::not_found(format!("GitHub user {} not found", username)))
    }

    async fn list_repositories(&self, repos_url: &str) -> CommandResult<Vec<String>> {
        let owner = Self::owner(repos_url);
        let count = self
            .users
            .lock()
            .unwrap()
            .get(&owner)
            .map(|(_, repos)| repos.len())
            .unwrap_or(0);
        Ok((0..count)
            .map(|i| format!("fake://{}/repo/{}", owner, i))
            .collect())
    }

    async fn fetch_repository_languages(&self, languages_url: &str) -> CommandResult<Vec<String>> {
        let owner = Self::owner(languages_url);
        let index: usize = languages_url
            .rsplit('/')
            .next()
            .and_then(|i| i.parse().ok())
            .unwrap_or(usize::MAX);
        self.users
            .lock()
            .unwrap()
            .get(&owner)
            .and_then(|(_, repos)| repos.get(index).cloned())
            .ok_or_else(|| CommandError::internal("fetch languages", "no such repository"))
    }
}

/// Classifier that returns a fixed intent and counts its calls.
pub struct ScriptedClassifier {
    intent: Intent,
    pub calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new(intent: Intent) -> Arc<Self> {
        Arc::new(Self {
            intent,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, _text: &str) -> CommandResult<Intent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.intent.clone())
    }
}

/// Transcriber that returns a fixed transcript.
pub struct ScriptedTranscriber(pub String);

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _audio: Vec<u8>, _file_name: &str) -> CommandResult<String> {
        Ok(self.0.clone())
    }
}

/// A schema-initialized SQLite store in a temporary directory.
pub async fn temp_store(tmp: &TempDir) -> SqliteUserStore {
    let path = tmp.path().join("users.sqlite");
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .unwrap()
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await
        .unwrap();
    create_schema(&pool).await.unwrap();
    SqliteUserStore::new(pool)
}

pub async fn setup() -> (TempDir, Arc<FakeGitHub>, UserCommands) {
    let tmp = TempDir::new().unwrap();
    let github = FakeGitHub::new();
    let store = Arc::new(temp_store(&tmp).await);
    let commands = UserCommands::new(github.clone(), store);
    (tmp, github, commands)
}
