//! Retrieval query builder.
//!
//! Builds the single `SELECT` used by `get-one` and `get-many` over the
//! `github_users` ⟕ `user_languages` relation. Filters that are absent never
//! produce a predicate or a placeholder; the language filter is applied in
//! `HAVING` against the aggregated list, so a user matches when any of its
//! languages contains the substring.
//!
//! ```
//! use github_user_store::query::UserQuery;
//!
//! let q = UserQuery::new()
//!     .location(Some("SF"))
//!     .language(Some("Go"))
//!     .sort(Some("followers"))
//!     .build();
//! assert_eq!(q.params, vec!["SF".to_string(), "Go".to_string()]);
//! assert!(q.sql.contains("ORDER BY u.followers DESC"));
//! ```

use std::collections::BTreeSet;

/// Delimiter between languages in the aggregated column.
pub const LANGUAGE_DELIMITER: &str = ", ";

/// Columns a listing may be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Username,
    Location,
    Company,
    Followers,
    Following,
}

impl SortKey {
    /// Parses a sort key. Missing or unrecognized keys fall back to
    /// [`SortKey::Username`] without an error.
    pub fn parse(key: Option<&str>) -> SortKey {
        match key.map(|k| k.trim().to_ascii_lowercase()).as_deref() {
            Some("username") => SortKey::Username,
            Some("location") => SortKey::Location,
            Some("company") => SortKey::Company,
            Some("followers") => SortKey::Followers,
            Some("following") => SortKey::Following,
            _ => SortKey::Username,
        }
    }

    /// `ORDER BY` clause body. Text keys ascend, popularity keys descend.
    fn order_by(self) -> &'static str {
        match self {
            SortKey::Username => "u.username ASC",
            SortKey::Location => "u.location ASC, u.username ASC",
            SortKey::Company => "u.company ASC, u.username ASC",
            SortKey::Followers => "u.followers DESC, u.username ASC",
            SortKey::Following => "u.following DESC, u.username ASC",
        }
    }
}

/// A finished query and its positional bind parameters, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<String>,
}

/// Builder for the user retrieval query.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    username: Option<String>,
    location: Option<String>,
    company: Option<String>,
    language: Option<String>,
    sort: SortKey,
}

impl UserQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one user (used by `get-one`).
    pub fn username(mut self, username: Option<&str>) -> Self {
        self.username = username.map(str::to_string);
        self
    }

    pub fn location(mut self, location: Option<&str>) -> Self {
        self.location = location.map(str::to_string);
        self
    }

    pub fn company(mut self, company: Option<&str>) -> Self {
        self.company = company.map(str::to_string);
        self
    }

    pub fn language(mut self, language: Option<&str>) -> Self {
        self.language = language.map(str::to_string);
        self
    }

    pub fn sort(mut self, sort: Option<&str>) -> Self {
        self.sort = SortKey::parse(sort);
        self
    }

    pub fn build(self) -> BuiltQuery {
        let mut sql = String::from(
            "SELECT u.username, u.name, u.bio, u.location, u.company, u.followers, u.following, \
             COALESCE(GROUP_CONCAT(l.language, ', '), '') AS languages \
             FROM github_users u \
             LEFT JOIN user_languages l ON l.user_id = u.id",
        );
        let mut params = Vec::new();
        let mut conditions = Vec::new();

        for (column, value) in [
            ("u.username", self.username),
            ("u.location", self.location),
            ("u.company", self.company),
        ] {
            if let Some(value) = value {
                conditions.push(format!("{} = ?", column));
                params.push(value);
            }
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        sql.push_str(" GROUP BY u.id");

        if let Some(language) = self.language {
            // instr is case-sensitive and has no wildcards, unlike LIKE.
            sql.push_str(" HAVING instr(COALESCE(GROUP_CONCAT(l.language, ', '), ''), ?) > 0");
            params.push(language);
        }

        sql.push_str(" ORDER BY ");
        sql.push_str(self.sort.order_by());

        BuiltQuery { sql, params }
    }
}

/// Splits an aggregated language column back into a set.
pub fn split_languages(aggregated: &str) -> BTreeSet<String> {
    aggregated
        .split(LANGUAGE_DELIMITER)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
