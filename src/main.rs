//! # GitHub User Store CLI (`ghu`)
//!
//! ## Usage
//!
//! ```bash
//! ghu --config ./config/ghu.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ghu init` | Create the SQLite database and its tables |
//! | `ghu add-user <username>` | Fetch a GitHub user and store it |
//! | `ghu update-user <username>` | Refresh a stored user from GitHub |
//! | `ghu delete-user <username>` | Remove a stored user |
//! | `ghu get-user <username>` | Show one stored user |
//! | `ghu get-users` | List stored users with optional filters |
//! | `ghu populate` | Bulk-load users from a JSON payload file |
//! | `ghu ai <words...>` | Run a free-text request through the classifier |
//! | `ghu ai-voice <file>` | Transcribe a recording and run it |
//! | `ghu serve` | Start the HTTP server |
//!
//! Logs go to stderr (`RUST_LOG` controls the level); results go to stdout.
//! A failed command prints `Error: <message>` and exits with status 1.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use github_user_store::classifier::{OpenAiClassifier, OpenAiTranscriber};
use github_user_store::commands::UserCommands;
use github_user_store::config::{self, Config};
use github_user_store::error::CommandResult;
use github_user_store::github::GitHubClient;
use github_user_store::intent::{CommandOutput, IntentResolver};
use github_user_store::models::{UserFilter, UserRecord};
use github_user_store::store::SqliteUserStore;
use github_user_store::{db, migrate, populate, server};

/// GitHub User Store: track GitHub users and their repository languages.
#[derive(Parser)]
#[command(
    name = "ghu",
    about = "GitHub User Store: track GitHub users and their repository languages",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ghu.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it again is safe.
    Init,

    /// Fetch a GitHub user and store it.
    AddUser { username: String },

    /// Refresh a stored user's profile and languages from GitHub.
    UpdateUser { username: String },

    /// Remove a stored user and its languages.
    DeleteUser { username: String },

    /// Show one stored user.
    GetUser { username: String },

    /// List stored users.
    GetUsers {
        /// Only users with exactly this location.
        #[arg(short = 'l', long)]
        location: Option<String>,

        /// Only users with exactly this company.
        #[arg(short = 'c', long)]
        company: Option<String>,

        /// Only users with a language containing this text.
        #[arg(short = 'L', long)]
        language: Option<String>,

        /// Sort key: username, location, company, followers or following.
        /// Anything else sorts by username.
        #[arg(short = 's', long)]
        sort: Option<String>,
    },

    /// Bulk-load users from a JSON payload file. All or nothing.
    Populate {
        /// Payload file. Defaults to `[populate].path` from the config.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Run a free-text request, e.g. `ghu ai add user octocat`.
    Ai {
        #[arg(required = true, num_args = 1..)]
        input: Vec<String>,
    },

    /// Transcribe an audio recording and run it as a request.
    AiVoice { file: PathBuf },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing("info");

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::AddUser { username } => {
            let commands = open_commands(&cfg).await?;
            let user = exit_on_error(commands.create(&username).await);
            println!("User {} added successfully.", user.username);
            print_user(&user);
        }
        Commands::UpdateUser { username } => {
            let commands = open_commands(&cfg).await?;
            let user = exit_on_error(commands.update(&username).await);
            println!("User {} updated successfully.", user.username);
            print_user(&user);
        }
        Commands::DeleteUser { username } => {
            let commands = open_commands(&cfg).await?;
            println!("{}", exit_on_error(commands.delete(&username).await));
        }
        Commands::GetUser { username } => {
            let commands = open_commands(&cfg).await?;
            print_user(&exit_on_error(commands.get_one(&username).await));
        }
        Commands::GetUsers {
            location,
            company,
            language,
            sort,
        } => {
            let commands = open_commands(&cfg).await?;
            let filter = UserFilter {
                location,
                company,
                language,
                sort,
            };
            print_users(&exit_on_error(commands.get_many(filter).await));
        }
        Commands::Populate { file } => {
            let commands = open_commands(&cfg).await?;
            let path = file.unwrap_or_else(|| cfg.populate.path.clone());
            let count = exit_on_error(populate::populate_from_file(&commands, &path).await);
            println!("Loaded {} users.", count);
        }
        Commands::Ai { input } => {
            let resolver = open_resolver(&cfg).await?;
            let output = exit_on_error(resolver.resolve(&input.join(" ")).await);
            print_output(&output);
        }
        Commands::AiVoice { file } => {
            let resolver = open_resolver(&cfg).await?;
            let audio = tokio::fs::read(&file).await?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "audio".to_string());
            let output = exit_on_error(resolver.resolve_audio(audio, &file_name).await);
            print_output(&output);
        }
    }

    Ok(())
}

async fn open_commands(cfg: &Config) -> anyhow::Result<UserCommands> {
    let pool = db::connect(cfg).await?;
    migrate::create_schema(&pool).await?;
    let profiles = Arc::new(GitHubClient::new(&cfg.github)?);
    Ok(UserCommands::new(profiles, Arc::new(SqliteUserStore::new(pool))))
}

async fn open_resolver(cfg: &Config) -> anyhow::Result<IntentResolver> {
    let commands = open_commands(cfg).await?;
    Ok(IntentResolver::new(commands, cfg.populate.path.clone())
        .with_classifier(Arc::new(OpenAiClassifier::new(&cfg.openai)?))
        .with_transcriber(Arc::new(OpenAiTranscriber::new(&cfg.openai)?)))
}

/// Unwraps a command result, or prints the error and exits with status 1.
fn exit_on_error<T>(result: CommandResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_output(output: &CommandOutput) {
    match output {
        CommandOutput::User(user) => print_user(user),
        CommandOutput::Users(users) => print_users(users),
        CommandOutput::Deleted { message, .. } => println!("{}", message),
        CommandOutput::Loaded { count } => println!("Loaded {} users.", count),
    }
}

fn print_users(users: &[UserRecord]) {
    if users.is_empty() {
        println!("No users.");
        return;
    }
    for user in users {
        print_user(user);
    }
}

fn print_user(user: &UserRecord) {
    let text = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    let count = |v: Option<i64>| v.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string());
    let languages: Vec<&str> = user.languages.iter().map(String::as_str).collect();

    println!("--- {} ---", user.username);
    println!("name:       {}", text(&user.name));
    println!("bio:        {}", text(&user.bio));
    println!("location:   {}", text(&user.location));
    println!("company:    {}", text(&user.company));
    println!("followers:  {}", count(user.followers));
    println!("following:  {}", count(user.following));
    println!("languages:  {}", languages.join(", "));
    println!();
}
