//! Intent resolution.
//!
//! Turns a classifier's structured guess into an executed command:
//!
//! ```text
//! text ──▶ Classifier ──▶ Intent ──▶ validate ──▶ UserCommands ──▶ CommandOutput
//! audio ─▶ Transcriber ─┘
//! ```
//!
//! The action text is parsed into the closed [`Action`] enum. Anything else
//! is `UnknownAction`. Actions that address one user require a username;
//! without one the resolver answers `ValidationFailed` before touching any
//! collaborator. The command's own result is returned unchanged.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::classifier::{Classifier, Transcriber};
use crate::commands::UserCommands;
use crate::error::{CommandError, CommandResult};
use crate::models::{non_blank, UserFilter, UserRecord};
use crate::populate;

/// A classifier's structured reading of a request.
///
/// Blank strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
}

impl Intent {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// The fixed action grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
    GetOne,
    GetMany,
    BulkLoad,
}

impl FromStr for Action {
    type Err = CommandError;

    /// Accepts the canonical names and the classifier prompt's vocabulary,
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" | "add-user" => Ok(Action::Create),
            "update" | "update-user" => Ok(Action::Update),
            "delete" | "delete-user" => Ok(Action::Delete),
            "get-one" | "get-user" => Ok(Action::GetOne),
            "get-many" | "get-users" => Ok(Action::GetMany),
            "bulk-load" | "populate" => Ok(Action::BulkLoad),
            _ => Err(CommandError::unknown_action(s)),
        }
    }
}

/// What a resolved intent produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CommandOutput {
    User(UserRecord),
    Users(Vec<UserRecord>),
    Deleted { username: String, message: String },
    Loaded { count: usize },
}

/// Validates intents and dispatches them to [`UserCommands`].
#[derive(Clone)]
pub struct IntentResolver {
    commands: UserCommands,
    classifier: Option<Arc<dyn Classifier>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    populate_path: PathBuf,
}

impl IntentResolver {
    pub fn new(commands: UserCommands, populate_path: PathBuf) -> Self {
        Self {
            commands,
            classifier: None,
            transcriber: None,
            populate_path,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Classifies free text and resolves the resulting intent.
    pub async fn resolve(&self, text: &str) -> CommandResult<CommandOutput> {
        if text.trim().is_empty() {
            return Err(CommandError::validation("text is required"));
        }
        let classifier = self
            .classifier
            .as_ref()
            .ok_or_else(|| CommandError::internal("resolve", "no classifier configured"))?;

        let intent = classifier.classify(text).await?;
        info!(action = %intent.action, "classified request");
        self.resolve_intent(intent).await
    }

    /// Transcribes recorded audio, then resolves it like text.
    pub async fn resolve_audio(&self, audio: Vec<u8>, file_name: &str) -> CommandResult<CommandOutput> {
        if audio.is_empty() {
            return Err(CommandError::validation("audio file is required"));
        }
        let transcriber = self
            .transcriber
            .as_ref()
            .ok_or_else(|| CommandError::internal("resolve audio", "no transcriber configured"))?;

        let transcript = transcriber.transcribe(audio, file_name).await?;
        info!(transcript = %transcript, "transcribed audio");
        self.resolve(&transcript).await
    }

    /// Validates an intent against the action grammar and runs it.
    pub async fn resolve_intent(&self, intent: Intent) -> CommandResult<CommandOutput> {
        let action: Action = intent.action.parse()?;

        match action {
            Action::Create => {
                let username = required_username(&intent)?;
                self.commands.create(&username).await.map(CommandOutput::User)
            }
            Action::Update => {
                let username = required_username(&intent)?;
                self.commands.update(&username).await.map(CommandOutput::User)
            }
            Action::Delete => {
                let username = required_username(&intent)?;
                let message = self.commands.delete(&username).await?;
                Ok(CommandOutput::Deleted { username, message })
            }
            Action::GetOne => {
                let username = required_username(&intent)?;
                self.commands.get_one(&username).await.map(CommandOutput::User)
            }
            Action::GetMany => {
                let filter = UserFilter {
                    location: intent.location,
                    company: intent.company,
                    language: intent.language,
                    sort: intent.sort,
                };
                self.commands.get_many(filter).await.map(CommandOutput::Users)
            }
            Action::BulkLoad => {
                let count = populate::populate_from_file(&self.commands, &self.populate_path).await?;
                Ok(CommandOutput::Loaded { count })
            }
        }
    }
}

fn required_username(intent: &Intent) -> CommandResult<String> {
    non_blank(intent.username.clone()).ok_or_else(|| {
        CommandError::validation(format!(
            "action '{}' requires a username",
            intent.action.trim()
        ))
    })
}
