//! User persistence.
//!
//! [`UserStore`] is the contract the command layer depends on;
//! [`SqliteUserStore`] implements it over the `github_users` and
//! `user_languages` tables.
//!
//! Every multi-statement write runs inside one transaction:
//!
//! | Method | Statements |
//! |--------|------------|
//! | [`insert_user`](UserStore::insert_user) | insert user, insert languages |
//! | [`replace_user`](UserStore::replace_user) | update user, delete languages, insert languages |
//! | [`delete_user`](UserStore::delete_user) | delete languages, delete user |
//! | [`bulk_insert`](UserStore::bulk_insert) | all of the above per user, for the whole batch |
//!
//! A failure part-way drops the transaction, which rolls it back.

use async_trait::async_trait;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::BTreeSet;

use crate::error::{CommandError, CommandResult};
use crate::models::{NewUser, UserFilter, UserRecord};
use crate::query::{split_languages, UserQuery};

/// Transactional store for users and their language sets.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Internal row id for a username, if the user exists.
    async fn find_user_id(&self, username: &str) -> CommandResult<Option<i64>>;

    /// Inserts a new user. `Conflict` if the username is taken.
    async fn insert_user(&self, user: &NewUser) -> CommandResult<()>;

    /// Replaces every scalar field and the whole language set.
    /// `NotFound` if the user does not exist.
    async fn replace_user(&self, user: &NewUser) -> CommandResult<()>;

    /// Removes a user and its languages. `NotFound` if absent.
    async fn delete_user(&self, username: &str) -> CommandResult<()>;

    async fn get_user(&self, username: &str) -> CommandResult<Option<UserRecord>>;

    async fn list_users(&self, filter: &UserFilter) -> CommandResult<Vec<UserRecord>>;

    /// Inserts every user or none of them. Returns the number inserted.
    async fn bulk_insert(&self, users: &[NewUser]) -> CommandResult<usize>;
}

/// SQLite implementation of [`UserStore`].
#[derive(Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch(&self, query: UserQuery) -> CommandResult<Vec<UserRecord>> {
        let built = query.build();
        let mut q = sqlx::query(&built.sql);
        for param in &built.params {
            q = q.bind(param);
        }
        let rows = q.fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let languages: String = row.get("languages");
                UserRecord {
                    username: row.get("username"),
                    name: row.get("name"),
                    bio: row.get("bio"),
                    location: row.get("location"),
                    company: row.get("company"),
                    followers: row.get("followers"),
                    following: row.get("following"),
                    languages: split_languages(&languages),
                }
            })
            .collect())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

async fn insert_user_row(conn: &mut SqliteConnection, user: &NewUser) -> Result<i64, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        r#"
        INSERT INTO github_users (username, name, bio, location, company, followers, following, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.name)
    .bind(&user.bio)
    .bind(&user.location)
    .bind(&user.company)
    .bind(user.followers)
    .bind(user.following)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

async fn insert_languages(
    conn: &mut SqliteConnection,
    user_id: i64,
    languages: &BTreeSet<String>,
) -> Result<(), sqlx::Error> {
    for language in languages {
        sqlx::query("INSERT INTO user_languages (user_id, language) VALUES (?, ?)")
            .bind(user_id)
            .bind(language)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn find_user_id(&self, username: &str) -> CommandResult<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM github_users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn insert_user(&self, user: &NewUser) -> CommandResult<()> {
        let mut tx = self.pool.begin().await?;

        let user_id = match insert_user_row(&mut tx, user).await {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e) => {
                return Err(CommandError::conflict(format!(
                    "user {} already exists",
                    user.username
                )));
            }
            Err(e) => return Err(CommandError::internal(format!("insert {}", user.username), e)),
        };

        insert_languages(&mut tx, user_id, &user.languages)
            .await
            .map_err(|e| CommandError::internal(format!("insert languages for {}", user.username), e))?;

        tx.commit().await?;
        Ok(())
    }

    async fn replace_user(&self, user: &NewUser) -> CommandResult<()> {
        let mut tx = self.pool.begin().await?;

        let user_id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE github_users
            SET name = ?, bio = ?, location = ?, company = ?, followers = ?, following = ?
            WHERE username = ?
            RETURNING id
            "#,
        )
        .bind(&user.name)
        .bind(&user.bio)
        .bind(&user.location)
        .bind(&user.company)
        .bind(user.followers)
        .bind(user.following)
        .bind(&user.username)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| CommandError::internal(format!("update {}", user.username), e))?;

        let Some(user_id) = user_id else {
            return Err(CommandError::not_found(format!(
                "user {} not found",
                user.username
            )));
        };

        sqlx::query("DELETE FROM user_languages WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                CommandError::internal(format!("replace languages for {}", user.username), e)
            })?;

        insert_languages(&mut tx, user_id, &user.languages)
            .await
            .map_err(|e| {
                CommandError::internal(format!("replace languages for {}", user.username), e)
            })?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> CommandResult<()> {
        let user_id = self
            .find_user_id(username)
            .await?
            .ok_or_else(|| CommandError::not_found(format!("user {} not found", username)))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_languages WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM github_users WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        // Lost a race with another delete.
        if deleted.rows_affected() == 0 {
            return Err(CommandError::not_found(format!("user {} not found", username)));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_user(&self, username: &str) -> CommandResult<Option<UserRecord>> {
        let mut users = self
            .fetch(UserQuery::new().username(Some(username)))
            .await?;
        Ok(users.pop())
    }

    async fn list_users(&self, filter: &UserFilter) -> CommandResult<Vec<UserRecord>> {
        self.fetch(
            UserQuery::new()
                .location(filter.location.as_deref())
                .company(filter.company.as_deref())
                .language(filter.language.as_deref())
                .sort(filter.sort.as_deref()),
        )
        .await
    }

    async fn bulk_insert(&self, users: &[NewUser]) -> CommandResult<usize> {
        let mut tx = self.pool.begin().await?;

        for user in users {
            let user_id = insert_user_row(&mut tx, user)
                .await
                .map_err(|e| CommandError::internal(format!("bulk insert {}", user.username), e))?;
            insert_languages(&mut tx, user_id, &user.languages)
                .await
                .map_err(|e| {
                    CommandError::internal(format!("bulk insert languages for {}", user.username), e)
                })?;
        }

        tx.commit().await?;
        Ok(users.len())
    }
}
