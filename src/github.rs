//! GitHub profile source.
//!
//! [`ProfileSource`] is what the command layer needs from a code-hosting
//! platform: a user's profile and the set of languages across their
//! repositories. [`GitHubClient`] implements it against the GitHub REST API.
//!
//! Language discovery lists the user's repositories, then fetches every
//! repository's language breakdown concurrently. A repository whose
//! languages cannot be fetched is logged and skipped; only a failure to
//! list the repositories fails the whole lookup.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GitHubConfig;
use crate::error::{CommandError, CommandResult};
use crate::models::GitHubProfile;

/// Source of user profiles and repository languages.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Fetches one user's profile. `NotFound` when the platform has no such user.
    async fn fetch_profile(&self, username: &str) -> CommandResult<GitHubProfile>;

    /// Lists the languages URL of every repository at `repos_url`.
    async fn list_repositories(&self, repos_url: &str) -> CommandResult<Vec<String>>;

    /// Language names reported for one repository.
    async fn fetch_repository_languages(&self, languages_url: &str) -> CommandResult<Vec<String>>;

    /// Merged, deduplicated language set across all repositories at `repos_url`.
    async fn fetch_languages(&self, repos_url: &str) -> CommandResult<BTreeSet<String>> {
        let repositories = self
            .list_repositories(repos_url)
            .await
            .map_err(|e| e.context(format!("failed to fetch repositories from {}", repos_url)))?;

        let lookups = repositories.iter().map(|url| async move {
            match self.fetch_repository_languages(url).await {
                Ok(languages) => languages,
                Err(e) => {
                    warn!(repository = %url, error = %e, "skipping repository languages");
                    Vec::new()
                }
            }
        });

        let languages: BTreeSet<String> = join_all(lookups).await.into_iter().flatten().collect();
        debug!(
            repositories = repositories.len(),
            languages = languages.len(),
            "language discovery finished"
        );
        Ok(languages)
    }
}

/// GitHub REST API v3 client.
pub struct GitHubClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct UserResponse {
    name: Option<String>,
    bio: Option<String>,
    location: Option<String>,
    company: Option<String>,
    followers: Option<i64>,
    following: Option<i64>,
    repos_url: String,
}

#[derive(Deserialize)]
struct RepositoryResponse {
    languages_url: String,
}

impl GitHubClient {
    /// Builds a client from config. Picks up `GITHUB_TOKEN` if set.
    pub fn new(config: &GitHubConfig) -> CommandResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("github-user-store/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CommandError::internal("failed to build GitHub client", e))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            client,
        })
    }

    /// Resolves a path against the base URL; absolute URLs pass through.
    fn url(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else {
            format!("{}/{}", self.base_url, path_or_url.trim_start_matches('/'))
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, reqwest::Error> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github.v3+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        request.send().await
    }
}

#[async_trait]
impl ProfileSource for GitHubClient {
    async fn fetch_profile(&self, username: &str) -> CommandResult<GitHubProfile> {
        let url = self.url(&format!("users/{}", username));
        let context = format!("failed to fetch GitHub user {}", username);

        let response = self
            .get(&url)
            .await
            .map_err(|e| CommandError::internal(&context, e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CommandError::not_found(format!(
                "GitHub user {} not found",
                username
            )));
        }

        let user: UserResponse = response
            .error_for_status()
            .map_err(|e| CommandError::internal(&context, e))?
            .json()
            .await
            .map_err(|e| CommandError::internal(&context, e))?;

        Ok(GitHubProfile {
            name: user.name,
            bio: user.bio,
            location: user.location,
            company: user.company,
            followers: user.followers,
            following: user.following,
            repos_url: user.repos_url,
        })
    }

    async fn list_repositories(&self, repos_url: &str) -> CommandResult<Vec<String>> {
        let repos: Vec<RepositoryResponse> = self
            .get(&self.url(repos_url))
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| CommandError::internal("list repositories", e))?
            .json()
            .await
            .map_err(|e| CommandError::internal("list repositories", e))?;

        Ok(repos.into_iter().map(|r| r.languages_url).collect())
    }

    async fn fetch_repository_languages(&self, languages_url: &str) -> CommandResult<Vec<String>> {
        let breakdown: HashMap<String, u64> = self
            .get(&self.url(languages_url))
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| CommandError::internal("fetch repository languages", e))?
            .json()
            .await
            .map_err(|e| CommandError::internal("fetch repository languages", e))?;

        Ok(breakdown.into_keys().collect())
    }
}
