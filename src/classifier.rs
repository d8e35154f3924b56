//! Language-model collaborators.
//!
//! - [`Classifier`] turns free text into a structured [`Intent`].
//! - [`Transcriber`] turns recorded audio into text.
//!
//! [`OpenAiClassifier`] and [`OpenAiTranscriber`] implement them with the
//! OpenAI chat-completions and audio-transcription endpoints. Both read the
//! API key from `OPENAI_API_KEY` when constructed.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::config::OpenAiConfig;
use crate::error::{CommandError, CommandResult};
use crate::intent::Intent;

/// System prompt describing the JSON shape the model must answer with.
pub const CLASSIFIER_PROMPT: &str = "\
You are working as a smart ai assistant.
Your job is to process and classify the message into a JSON structure.
All the JSON objects can have these keys:
{
  action => can have these values: [
    add-user,
    update-user,
    delete-user,
    get-user,
    get-users,
    populate
  ]
  username => leave it empty if not mentioned
  location => leave it empty if not mentioned
  company => leave it empty if not mentioned
  language => programming language, leave it empty if not mentioned
  sort => can have these values:
    [username,location,company,followers,following], leave it empty otherwise
}
Respond with the JSON object only.";

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> CommandResult<Intent>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> CommandResult<String>;
}

fn openai_client(config: &OpenAiConfig) -> CommandResult<(reqwest::Client, String)> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| CommandError::internal("openai", "OPENAI_API_KEY environment variable not set"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| CommandError::internal("failed to build OpenAI client", e))?;

    Ok((client, api_key))
}

/// Chat-completions backed [`Classifier`].
pub struct OpenAiClassifier {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClassifier {
    pub fn new(config: &OpenAiConfig) -> CommandResult<Self> {
        let (client, api_key) = openai_client(config)?;
        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, text: &str) -> CommandResult<Intent> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": CLASSIFIER_PROMPT },
                { "role": "user", "content": text },
            ],
        });

        let response: serde_json::Value = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| CommandError::internal("classify", e))?
            .json()
            .await
            .map_err(|e| CommandError::internal("classify", e))?;

        let content = response
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| CommandError::internal("classify", "response has no message content"))?;

        debug!(content, "classifier answered");
        parse_intent(content)
    }
}

/// Parses the model's answer, tolerating a surrounding Markdown code fence.
pub fn parse_intent(content: &str) -> CommandResult<Intent> {
    let trimmed = content.trim();
    let json = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str::<Intent>(json).map_err(|e| CommandError::internal("parse classifier answer", e))
}

/// Whisper backed [`Transcriber`].
pub struct OpenAiTranscriber {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiTranscriber {
    pub fn new(config: &OpenAiConfig) -> CommandResult<Self> {
        let (client, api_key) = openai_client(config)?;
        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.transcription_model.clone(),
        })
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> CommandResult<String> {
        let part = reqwest::multipart::Part::bytes(audio).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .text("prompt", "Transcribe the following voice recording.")
            .part("file", part);

        let response: serde_json::Value = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| CommandError::internal("transcribe", e))?
            .json()
            .await
            .map_err(|e| CommandError::internal("transcribe", e))?;

        response
            .get("text")
            .and_then(|t| t.as_str())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| CommandError::internal("transcribe", "no transcript found in the response"))
    }
}
