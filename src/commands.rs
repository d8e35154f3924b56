//! User commands.
//!
//! The five CRUD operations plus bulk-load, each a short orchestration over
//! a [`ProfileSource`] and a [`UserStore`]. Used by the CLI, the HTTP server
//! and the intent resolver alike.
//!
//! Successful create, update, delete and bulk-load operations each emit one
//! `info` event on the `audit` target. Failures are logged at `error` with
//! the operation and subject before being returned.

use std::sync::Arc;
use tracing::{error, info};

use crate::error::{CommandError, CommandResult};
use crate::github::ProfileSource;
use crate::models::{NewUser, UserFilter, UserRecord};
use crate::store::UserStore;

/// Entry point for every user command.
#[derive(Clone)]
pub struct UserCommands {
    profiles: Arc<dyn ProfileSource>,
    store: Arc<dyn UserStore>,
}

impl UserCommands {
    pub fn new(profiles: Arc<dyn ProfileSource>, store: Arc<dyn UserStore>) -> Self {
        Self { profiles, store }
    }

    /// Fetches a user from the profile source and stores it.
    ///
    /// `Conflict` if the user is already stored; use [`update`](Self::update)
    /// to refresh an existing user.
    pub async fn create(&self, username: &str) -> CommandResult<UserRecord> {
        let username = require_username(username, "create")?;
        let result = async {
            if self.store.find_user_id(username).await?.is_some() {
                return Err(CommandError::conflict(format!(
                    "user {} already exists",
                    username
                )));
            }
            let user = self.fetch_user(username).await?;
            self.store.insert_user(&user).await?;
            Ok(user.into_record())
        }
        .await;

        log_outcome("create", username, result)
    }

    /// Re-fetches a stored user and replaces its fields and language set.
    pub async fn update(&self, username: &str) -> CommandResult<UserRecord> {
        let username = require_username(username, "update")?;
        let result = async {
            if self.store.find_user_id(username).await?.is_none() {
                return Err(CommandError::not_found(format!(
                    "user {} not found",
                    username
                )));
            }
            let user = self.fetch_user(username).await?;
            self.store.replace_user(&user).await?;
            Ok(user.into_record())
        }
        .await;

        log_outcome("update", username, result)
    }

    /// Removes a user and its languages.
    pub async fn delete(&self, username: &str) -> CommandResult<String> {
        let username = require_username(username, "delete")?;
        let result = self
            .store
            .delete_user(username)
            .await
            .map(|()| format!("User {} deleted successfully.", username));

        log_outcome("delete", username, result)
    }

    pub async fn get_one(&self, username: &str) -> CommandResult<UserRecord> {
        let username = require_username(username, "get-one")?;
        self.store
            .get_user(username)
            .await
            .and_then(|user| {
                user.ok_or_else(|| CommandError::not_found(format!("user {} not found", username)))
            })
            .map_err(|e| logged("get-one", username, e))
    }

    /// Lists users matching `filter`. Zero matches is an empty list.
    pub async fn get_many(&self, filter: UserFilter) -> CommandResult<Vec<UserRecord>> {
        let filter = filter.normalized();
        self.store
            .list_users(&filter)
            .await
            .map_err(|e| logged("get-many", "*", e))
    }

    /// Inserts a whole batch of users atomically.
    ///
    /// Any failing record rolls the batch back and is reported as one
    /// `Internal` error.
    pub async fn bulk_load(&self, users: &[NewUser]) -> CommandResult<usize> {
        let result = self
            .store
            .bulk_insert(users)
            .await
            .map_err(|e| CommandError::internal("bulk load rolled back", e));

        match result {
            Ok(count) => {
                info!(target: "audit", action = "bulk-load", count, "Loaded {} users.", count);
                Ok(count)
            }
            Err(e) => Err(logged("bulk-load", "*", e)),
        }
    }

    async fn fetch_user(&self, username: &str) -> CommandResult<NewUser> {
        let profile = self.profiles.fetch_profile(username).await?;
        let languages = self.profiles.fetch_languages(&profile.repos_url).await?;
        Ok(NewUser::from_profile(username, profile, languages))
    }
}

fn require_username<'a>(username: &'a str, action: &str) -> CommandResult<&'a str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(CommandError::validation(format!(
            "{}: username is required",
            action
        )));
    }
    Ok(username)
}

fn logged(action: &str, subject: &str, err: CommandError) -> CommandError {
    error!(action, subject, kind = %err.kind(), error = %err, "command failed");
    err
}

fn log_outcome<T>(action: &str, username: &str, result: CommandResult<T>) -> CommandResult<T> {
    match result {
        Ok(value) => {
            info!(target: "audit", action, username, "User {} {} succeeded.", username, action);
            Ok(value)
        }
        Err(e) => Err(logged(action, username, e.context(format!("{} {}", action, username)))),
    }
}
