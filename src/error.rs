//! Shared error taxonomy.
//!
//! Every command returns a [`CommandResult`]. Failures carry an
//! [`ErrorKind`] next to a human-readable message, so the CLI and the HTTP
//! server pick their outcome from the kind instead of matching on text.
//!
//! # Status mapping
//!
//! | Kind | HTTP | Code |
//! |------|------|------|
//! | [`ErrorKind::ValidationFailed`] | 400 | `validation_failed` |
//! | [`ErrorKind::NotFound`] | 404 | `not_found` |
//! | [`ErrorKind::Conflict`] | 500 | `conflict` |
//! | [`ErrorKind::UnknownAction`] | 500 | `unknown_action` |
//! | [`ErrorKind::Internal`] | 500 | `internal` |
//!
//! `Conflict` and `UnknownAction` keep the 500 status that HTTP clients of
//! this service already expect.

use std::fmt;

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Alias for `Result<T, CommandError>`.
pub type CommandResult<T> = Result<T, CommandError>;

/// Closed set of failure kinds shared by every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Required input was missing or malformed; no collaborator was called.
    ValidationFailed,
    /// The target entity does not exist.
    NotFound,
    /// The entity already exists where uniqueness is required.
    Conflict,
    /// The requested action is outside the action grammar.
    UnknownAction,
    /// A collaborator failed, a batch was rolled back, or something unexpected happened.
    Internal,
}

impl ErrorKind {
    /// Machine-readable code used in HTTP error bodies.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::ValidationFailed => "validation_failed",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::UnknownAction => "unknown_action",
            ErrorKind::Internal => "internal",
        }
    }

    /// HTTP status for this kind.
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict | ErrorKind::UnknownAction | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Classifies a bare error message the way older HTTP clients did:
    /// anything mentioning "not found" is [`ErrorKind::NotFound`], everything
    /// else is [`ErrorKind::Internal`].
    ///
    /// Only for callers that hold nothing but a message; typed errors should
    /// use [`CommandError::kind`].
    pub fn from_legacy_message(message: &str) -> ErrorKind {
        if message.to_lowercase().contains("not found") {
            ErrorKind::NotFound
        } else {
            ErrorKind::Internal
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A failed command: what went wrong and how the boundary should report it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CommandError {
    kind: ErrorKind,
    message: String,
}

impl CommandError {
    /// Builds an error, substituting the kind's code for an empty message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            kind.code().replace('_', " ")
        } else {
            message
        };
        Self { kind, message }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationFailed, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Names the action value that fell outside the grammar.
    pub fn unknown_action(action: &str) -> Self {
        Self::new(ErrorKind::UnknownAction, format!("unknown action: '{}'", action))
    }

    /// Wraps a collaborator failure with the operation and subject it happened in.
    pub fn internal(context: impl fmt::Display, err: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Internal, format!("{}: {}", context, err))
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Re-wraps an error with more context while keeping its kind.
    pub fn context(self, context: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{}: {}", context, self.message),
        }
    }
}

impl From<sqlx::Error> for CommandError {
    fn from(err: sqlx::Error) -> Self {
        CommandError::internal("database error", err)
    }
}
