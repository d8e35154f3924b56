//! # GitHub User Store
//!
//! Tracks GitHub users and the languages of their repositories in SQLite,
//! with CRUD access through a CLI (`ghu`) and an HTTP server, plus a
//! natural-language front end that maps free text or recorded speech onto
//! the same commands through an OpenAI model.
//!
//! ## Architecture
//!
//! ```text
//!  text ─┐   ┌────────────┐   ┌──────────┐   ┌──────────────┐   ┌──────────┐
//!        ├──▶│ Classifier │──▶│  Intent  │──▶│ UserCommands │──▶│  SQLite  │
//! audio ─┘   │ (OpenAI)   │   │ Resolver │   │              │   │  store   │
//!            └────────────┘   └──────────┘   └──────┬───────┘   └──────────┘
//!                                                   │
//!                                                   ▼
//!                                             ┌──────────┐
//!                                             │  GitHub  │
//!                                             │   API    │
//!                                             └──────────┘
//! ```
//!
//! Every command returns a [`error::CommandResult`]; the CLI and the HTTP
//! server turn its [`error::ErrorKind`] into an exit status or HTTP status.
//!
//! ## Quick Start
//!
//! ```bash
//! ghu init
//! ghu add-user octocat
//! ghu get-users --location "San Francisco" --language Go --sort followers
//! ghu ai "show me everyone at GitHub sorted by followers"
//! ghu serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy and status mapping |
//! | [`models`] | Core data types |
//! | [`query`] | Filtered, sorted retrieval query builder |
//! | [`store`] | User persistence |
//! | [`github`] | GitHub profile source |
//! | [`commands`] | The user commands |
//! | [`classifier`] | OpenAI classifier and transcriber |
//! | [`intent`] | Intent validation and dispatch |
//! | [`populate`] | Bulk loader |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod classifier;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod github;
pub mod intent;
pub mod migrate;
pub mod models;
pub mod populate;
pub mod query;
pub mod server;
pub mod store;
