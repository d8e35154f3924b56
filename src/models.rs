//! Core data models.
//!
//! These types describe the users that flow between the profile source, the
//! store and the CLI/HTTP boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A stored GitHub user with its aggregated language set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub followers: Option<i64>,
    pub following: Option<i64>,
    /// Always present; empty when no repository reported a language.
    #[serde(default)]
    pub languages: BTreeSet<String>,
}

/// Profile fields returned by the profile source for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GitHubProfile {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub followers: Option<i64>,
    pub following: Option<i64>,
    /// Where the user's repository listing lives.
    pub repos_url: String,
}

/// A complete user payload ready to be written.
///
/// Used by create/update after the profile fetch, and read directly from the
/// bulk-load payload file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub followers: Option<i64>,
    #[serde(default)]
    pub following: Option<i64>,
    #[serde(default)]
    pub languages: BTreeSet<String>,
}

impl NewUser {
    pub fn from_profile(username: &str, profile: GitHubProfile, languages: BTreeSet<String>) -> Self {
        Self {
            username: username.to_string(),
            name: profile.name,
            bio: profile.bio,
            location: profile.location,
            company: profile.company,
            followers: profile.followers,
            following: profile.following,
            languages,
        }
    }

    pub fn into_record(self) -> UserRecord {
        UserRecord {
            username: self.username,
            name: self.name,
            bio: self.bio,
            location: self.location,
            company: self.company,
            followers: self.followers,
            following: self.following,
            languages: self.languages,
        }
    }
}

/// Optional filters and sort key for listing users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFilter {
    pub location: Option<String>,
    pub company: Option<String>,
    /// Substring matched against the aggregated language list.
    pub language: Option<String>,
    pub sort: Option<String>,
}

impl UserFilter {
    /// Drops blank values so they behave exactly like absent ones.
    pub fn normalized(self) -> Self {
        Self {
            location: non_blank(self.location),
            company: non_blank(self.company),
            language: non_blank(self.language),
            sort: non_blank(self.sort),
        }
    }
}

/// Returns `None` for missing or whitespace-only strings, trimmed otherwise.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
