//! HTTP server.
//!
//! Exposes the user commands and the natural-language front end as a JSON
//! API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/user` | Fetch a GitHub user and store it (`{ "username" }`) |
//! | `PUT` | `/user` | Refresh a stored user (`{ "username" }`) |
//! | `DELETE` | `/user/{username}` | Remove a stored user |
//! | `GET` | `/user/{username}` | Get one stored user |
//! | `GET` | `/users` | List users (`location`, `company`, `language`, `sort`) |
//! | `POST` | `/populate` | Bulk-load the configured payload file |
//! | `POST` | `/ai/text` | Run a free-text request (`{ "text" }`) |
//! | `POST` | `/ai/voice` | Run a recorded request (multipart field `file`) |
//! | `GET` | `/health` | Health check, never behind auth |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "get-one octocat: user octocat not found" } }
//! ```
//!
//! The status comes from the error's [`ErrorKind`](crate::error::ErrorKind): `validation_failed`
//! (400), `not_found` (404), `unauthorized` (401), everything else (500).
//!
//! # Authentication
//!
//! When `[server.auth]` is configured every route except `/health` requires
//! HTTP Basic credentials matching it.

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, Path, Query, Request, State,
    },
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::classifier::{OpenAiClassifier, OpenAiTranscriber};
use crate::commands::UserCommands;
use crate::config::{AuthConfig, Config};
use crate::db;
use crate::error::CommandError;
use crate::github::GitHubClient;
use crate::intent::{CommandOutput, IntentResolver};
use crate::migrate;
use crate::models::{UserFilter, UserRecord};
use crate::populate;
use crate::store::SqliteUserStore;

/// Largest accepted voice upload.
const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    commands: UserCommands,
    resolver: IntentResolver,
    auth: Option<Arc<AuthConfig>>,
    populate_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(
        commands: UserCommands,
        resolver: IntentResolver,
        auth: Option<AuthConfig>,
        populate_path: PathBuf,
    ) -> Self {
        Self {
            commands,
            resolver,
            auth: auth.map(Arc::new),
            populate_path: Arc::new(populate_path),
        }
    }
}

/// Starts the HTTP server on `[server].bind` with the real collaborators.
///
/// The AI routes answer with an internal error when `OPENAI_API_KEY` is not
/// set; every other route works without it.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::create_schema(&pool).await?;

    let profiles = Arc::new(GitHubClient::new(&config.github)?);
    let store = Arc::new(SqliteUserStore::new(pool));
    let commands = UserCommands::new(profiles, store);

    let mut resolver = IntentResolver::new(commands.clone(), config.populate.path.clone());
    match (
        OpenAiClassifier::new(&config.openai),
        OpenAiTranscriber::new(&config.openai),
    ) {
        (Ok(classifier), Ok(transcriber)) => {
            resolver = resolver
                .with_classifier(Arc::new(classifier))
                .with_transcriber(Arc::new(transcriber));
        }
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "AI routes disabled");
        }
    }

    let state = AppState::new(
        commands,
        resolver,
        config.server.auth.clone(),
        config.populate.path.clone(),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Builds the application router. Exposed so tests can serve it with fake
/// collaborators.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/user", post(handle_create).put(handle_update))
        .route("/user/{username}", get(handle_get_one).delete(handle_delete))
        .route("/users", get(handle_get_many))
        .route("/populate", post(handle_populate))
        .route("/ai/text", post(handle_ai_text))
        .route(
            "/ai/voice",
            post(handle_ai_voice).layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES)),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_basic_auth,
        ));

    Router::new()
        .route("/health", get(handle_health))
        .merge(protected)
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Error type that converts into an Axum HTTP response.
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CommandError> for AppError {
    fn from(err: CommandError) -> Self {
        let kind = err.kind();
        AppError {
            status: kind.status_code(),
            code: kind.code().to_string(),
            message: err.message().to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        CommandError::validation(format!("invalid JSON body: {}", rejection.body_text())).into()
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        CommandError::validation(format!("invalid multipart body: {}", rejection.body_text())).into()
    }
}

fn unauthorized(message: &str) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: message.to_string(),
    }
}

// ============ Basic auth ============

async fn require_basic_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.auth.as_deref() else {
        return Ok(next.run(request).await);
    };

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized("authorization header is missing"))?;

    let (username, password) = decode_basic(header_value)
        .ok_or_else(|| unauthorized("invalid authorization format"))?;

    if username != expected.username || password != expected.password {
        return Err(unauthorized("invalid credentials"));
    }

    Ok(next.run(request).await)
}

/// Decodes `Basic <base64(user:pass)>` into its two halves.
fn decode_basic(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /user ============

#[derive(Deserialize)]
struct UsernameBody {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Serialize)]
struct UserChanged {
    message: String,
    user: UserRecord,
}

#[derive(Serialize)]
struct Message {
    message: String,
}

async fn handle_create(
    State(state): State<AppState>,
    body: Result<Json<UsernameBody>, JsonRejection>,
) -> Result<Json<UserChanged>, AppError> {
    let Json(body) = body?;
    let user = state
        .commands
        .create(body.username.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(UserChanged {
        message: format!("User {} added successfully.", user.username),
        user,
    }))
}

async fn handle_update(
    State(state): State<AppState>,
    body: Result<Json<UsernameBody>, JsonRejection>,
) -> Result<Json<UserChanged>, AppError> {
    let Json(body) = body?;
    let user = state
        .commands
        .update(body.username.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(UserChanged {
        message: format!("User {} updated successfully.", user.username),
        user,
    }))
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Message>, AppError> {
    let message = state.commands.delete(&username).await?;
    Ok(Json(Message { message }))
}

async fn handle_get_one(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<UserRecord>, AppError> {
    Ok(Json(state.commands.get_one(&username).await?))
}

async fn handle_get_many(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Vec<UserRecord>>, AppError> {
    Ok(Json(state.commands.get_many(filter).await?))
}

// ============ POST /populate ============

#[derive(Serialize)]
struct PopulateResponse {
    message: String,
    count: usize,
}

async fn handle_populate(State(state): State<AppState>) -> Result<Json<PopulateResponse>, AppError> {
    let count = populate::populate_from_file(&state.commands, &state.populate_path).await?;
    Ok(Json(PopulateResponse {
        message: format!("Loaded {} users.", count),
        count,
    }))
}

// ============ /ai ============

#[derive(Deserialize)]
struct TextBody {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
struct AiResponse {
    result: CommandOutput,
}

async fn handle_ai_text(
    State(state): State<AppState>,
    body: Result<Json<TextBody>, JsonRejection>,
) -> Result<Json<AiResponse>, AppError> {
    let Json(body) = body?;
    let result = state
        .resolver
        .resolve(body.text.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(AiResponse { result }))
}

async fn handle_ai_voice(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AiResponse>, AppError> {
    let mut multipart = multipart?;
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CommandError::validation(format!("invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("audio").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| CommandError::validation(format!("invalid audio upload: {}", e)))?;
            upload = Some((bytes.to_vec(), file_name));
        }
    }

    let (audio, file_name) =
        upload.ok_or_else(|| AppError::from(CommandError::validation("audio file is required")))?;
    let result = state.resolver.resolve_audio(audio, &file_name).await?;
    Ok(Json(AiResponse { result }))
}
