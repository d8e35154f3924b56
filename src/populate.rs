//! One-shot bulk loader.
//!
//! Reads a JSON array of complete user payloads and hands it to
//! [`UserCommands::bulk_load`], which inserts all of them or none.
//!
//! ```json
//! [
//!   { "username": "octocat", "name": "The Octocat", "location": "SF",
//!     "followers": 10, "following": 0, "languages": ["Go", "Ruby"] }
//! ]
//! ```

use std::path::Path;

use crate::commands::UserCommands;
use crate::error::{CommandError, CommandResult};
use crate::models::NewUser;

/// Parses a payload file into users.
pub async fn load_file(path: &Path) -> CommandResult<Vec<NewUser>> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        CommandError::internal(format!("failed to read populate file {}", path.display()), e)
    })?;
    serde_json::from_str(&content).map_err(|e| {
        CommandError::internal(format!("failed to parse populate file {}", path.display()), e)
    })
}

/// Loads `path` and bulk-inserts its users. Returns the number inserted.
pub async fn populate_from_file(commands: &UserCommands, path: &Path) -> CommandResult<usize> {
    let users = load_file(path).await?;
    commands.bulk_load(&users).await
}
