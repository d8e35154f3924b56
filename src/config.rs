use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub populate: PopulateConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    #[serde(default = "default_github_url")]
    pub base_url: String,
    #[serde(default = "default_github_timeout")]
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            base_url: default_github_url(),
            timeout_secs: default_github_timeout(),
        }
    }
}

fn default_github_url() -> String {
    "https://api.github.com".to_string()
}
fn default_github_timeout() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    #[serde(default = "default_openai_timeout")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_url(),
            model: default_chat_model(),
            transcription_model: default_transcription_model(),
            timeout_secs: default_openai_timeout(),
        }
    }
}

fn default_openai_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_chat_model() -> String {
    "gpt-4o".to_string()
}
fn default_transcription_model() -> String {
    "whisper-1".to_string()
}
fn default_openai_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Basic-auth credentials. When absent every route is open.
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PopulateConfig {
    #[serde(default = "default_populate_path")]
    pub path: PathBuf,
}

impl Default for PopulateConfig {
    fn default() -> Self {
        Self {
            path: default_populate_path(),
        }
    }
}

fn default_populate_path() -> PathBuf {
    PathBuf::from("./conf/populate/users.json")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    if config.github.timeout_secs == 0 {
        anyhow::bail!("github.timeout_secs must be > 0");
    }

    if config.openai.timeout_secs == 0 {
        anyhow::bail!("openai.timeout_secs must be > 0");
    }

    if let Some(auth) = &config.server.auth {
        if auth.username.is_empty() {
            anyhow::bail!("server.auth.username must not be empty");
        }
    }

    Ok(())
}
