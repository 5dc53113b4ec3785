//! Web server for the context marketplace.
//!
//! Serves the session-authenticated HTML pages alongside the JSON API the
//! pages (and other clients) talk to. All context reads pass the visibility
//! gate and all context mutations pass the ownership gate before touching
//! the store.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/contexts` | Create a context (+ repo link, contributors, seed docs) |
//! | `GET`  | `/api/contexts` | List own + public contexts |
//! | `GET`  | `/api/contexts/{id}` | Fetch one context (visibility-gated) |
//! | `PUT`  | `/api/contexts/{id}` | Update name/description/visibility (owner) |
//! | `DELETE` | `/api/contexts/{id}` | Delete a context (owner) |
//! | `POST` | `/api/contexts/{id}/files` | Add or replace a document (owner) |
//! | `PUT`  | `/api/contexts/{id}/files/{name}` | Update a document (owner) |
//! | `DELETE` | `/api/contexts/{id}/files/{name}` | Remove a document (owner) |
//! | `POST` | `/api/contexts/{id}/contributors/{login}/toggle` | Flip selection, regenerate people doc (owner) |
//! | `POST` | `/api/contexts/{id}/create-pr` | Publish the bundle as a pull request (owner) |
//! | `GET`  | `/api/user/repositories-with-contexts` | List reachable repositories, annotated |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Page and OAuth routes live in [`crate::pages`] and [`crate::auth`].
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "Context not found" } }
//! ```
//!
//! Error codes: `bad_request` (400), `duplicate_link` (400), `unauthorized`
//! (401), `forbidden` (403), `not_found` (404), `upstream_error` (502),
//! `internal` (500).

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::auth;
use crate::config::Config;
use crate::generate;
use crate::github::{GitHubClient, RepoSummary};
use crate::models::{
    Context, ContextFile, CreateContextRequest, CreateFileRequest, UpdateContextRequest,
    UpdateFileRequest,
};
use crate::pages;
use crate::publish::{self, PublishError};
use crate::session::{self, SessionUser};
use crate::store::{ContextStore, StoreError};

/// Shared application state passed to all route handlers via Axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<ContextStore>,
    /// HMAC key for session cookies.
    pub session_secret: Arc<String>,
}

impl AppState {
    /// Reads the verified session user from request headers, if any.
    pub fn current_user(&self, headers: &HeaderMap) -> Option<SessionUser> {
        session::user_from_headers(&self.session_secret, headers)
    }

    pub(crate) fn require_user(&self, headers: &HeaderMap) -> Result<SessionUser, AppError> {
        self.current_user(headers)
            .ok_or_else(|| unauthorized("Authentication required"))
    }

    pub(crate) fn github_client(&self, user: &SessionUser) -> Result<GitHubClient, AppError> {
        GitHubClient::new(&self.config.github, user.access_token.clone())
            .map_err(|e| internal(e.to_string()))
    }
}

/// Starts the web server on `[server].bind`.
///
/// Rehydrates the context store from `[store].data_dir`, reads the session
/// secret from the environment, and serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let session_secret = crate::config::session_secret_from_env()?;
    let store = ContextStore::open(&config.store.data_dir)?;
    println!(
        "Loaded {} contexts from {}",
        store.len(),
        config.store.data_dir.display()
    );

    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        store: Arc::new(store),
        session_secret: Arc::new(session_secret),
    };
    let app = build_router(state);

    println!("Web server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(pages::handle_index))
        .route("/login", get(auth::handle_login))
        .route("/callback", get(auth::handle_callback))
        .route("/logout", get(auth::handle_logout))
        .route("/profile", get(pages::handle_profile))
        .route("/repositories", get(pages::handle_repositories))
        .route("/contexts", get(pages::handle_contexts))
        .route("/contexts/new", get(pages::handle_new_context))
        .route("/contexts/{id}", get(pages::handle_context_detail))
        .route("/contexts/{id}/edit", get(pages::handle_edit_context))
        .route(
            "/api/contexts",
            post(handle_create_context).get(handle_list_contexts),
        )
        .route(
            "/api/contexts/{id}",
            get(handle_get_context)
                .put(handle_update_context)
                .delete(handle_delete_context),
        )
        .route("/api/contexts/{id}/files", post(handle_create_file))
        .route(
            "/api/contexts/{id}/files/{name}",
            axum::routing::put(handle_update_file).delete(handle_delete_file),
        )
        .route(
            "/api/contexts/{id}/contributors/{login}/toggle",
            post(handle_toggle_contributor),
        )
        .route("/api/contexts/{id}/create-pr", post(handle_create_pr))
        .route(
            "/api/user/repositories-with-contexts",
            get(handle_list_repositories),
        )
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"not_found"`, `"duplicate_link"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
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

pub(crate) fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

pub(crate) fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: message.into(),
    }
}

pub(crate) fn forbidden(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::FORBIDDEN,
        code: "forbidden".to_string(),
        message: message.into(),
    }
}

pub(crate) fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

/// Constructs a 502 error for GitHub-side publish failures.
pub(crate) fn upstream_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream_error".to_string(),
        message: message.into(),
    }
}

pub(crate) fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::DuplicateLink { .. } => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "duplicate_link".to_string(),
                message: err.to_string(),
            },
            _ => internal(err.to_string()),
        }
    }
}

impl From<PublishError> for AppError {
    fn from(err: PublishError) -> Self {
        match &err {
            PublishError::NotLinked => bad_request(err.to_string()),
            PublishError::RepoAccess => not_found(err.to_string()),
            _ => upstream_error(err.to_string()),
        }
    }
}

// ============ Access gate ============

/// Whether the context may be read by the given (possibly anonymous) caller.
pub(crate) fn visible_to(context: &Context, user: Option<&SessionUser>) -> bool {
    if context.is_public {
        return true;
    }
    match user {
        Some(u) => u.owner_id() == context.owner_id,
        None => false,
    }
}

pub(crate) fn owned_by(context: &Context, user: &SessionUser) -> bool {
    user.owner_id() == context.owner_id
}

/// Fetches a context and enforces the ownership gate, the shared entry for
/// every mutating handler.
fn owned_context(state: &AppState, user: &SessionUser, id: &str) -> Result<Context, AppError> {
    let context = state
        .store
        .get_context(id)
        .ok_or_else(|| not_found("Context not found"))?;
    if !owned_by(&context, user) {
        return Err(forbidden("Access denied"));
    }
    Ok(context)
}

fn validate_file_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(bad_request("File name must be a plain name"));
    }
    Ok(())
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

// ============ Context API ============

/// Handler for `POST /api/contexts`.
///
/// Creates the context, then best-effort enriches it: when a repository URL
/// was supplied, the repo snapshot and contributor list are fetched with the
/// caller's token, and enrichment failure leaves the context bare rather
/// than failing the request. Finishes by seeding the four default documents.
async fn handle_create_context(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateContextRequest>,
) -> Result<Json<Context>, AppError> {
    let user = state.require_user(&headers)?;
    let repo_url = req.github_repo_url.clone();

    let context = state
        .store
        .create_context(&user.owner_id(), &user.login, req)?;

    if let Some(url) = repo_url.as_deref() {
        let github = state.github_client(&user)?;
        if let Some(repo_info) = github.repo_info(url).await {
            let owner = repo_info.owner.clone();
            let name = repo_info.name.clone();
            state.store.set_repo_link(&context.id, repo_info)?;

            let contributors = github.contributors(&owner, &name).await;
            state.store.set_contributors(&context.id, contributors)?;
        }
    }

    generate::generate_default_files(&state.store, &context.id)?;

    let refreshed = state
        .store
        .get_context(&context.id)
        .ok_or_else(|| internal("context disappeared during creation"))?;
    Ok(Json(refreshed))
}

#[derive(Serialize)]
struct ContextListResponse {
    user_contexts: Vec<Context>,
    public_contexts: Vec<Context>,
}

/// Handler for `GET /api/contexts`.
///
/// Authenticated callers get their own contexts plus other users' public
/// ones; anonymous callers get the public list only.
async fn handle_list_contexts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<ContextListResponse> {
    match state.current_user(&headers) {
        Some(user) => {
            let owner_id = user.owner_id();
            let user_contexts = state.store.contexts_for_owner(&owner_id);
            let public_contexts = state
                .store
                .public_contexts()
                .into_iter()
                .filter(|c| c.owner_id != owner_id)
                .collect();
            Json(ContextListResponse {
                user_contexts,
                public_contexts,
            })
        }
        None => Json(ContextListResponse {
            user_contexts: Vec::new(),
            public_contexts: state.store.public_contexts(),
        }),
    }
}

async fn handle_get_context(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Context>, AppError> {
    let context = state
        .store
        .get_context(&id)
        .ok_or_else(|| not_found("Context not found"))?;
    let user = state.current_user(&headers);
    if !visible_to(&context, user.as_ref()) {
        return Err(forbidden("Access denied"));
    }
    Ok(Json(context))
}

async fn handle_update_context(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateContextRequest>,
) -> Result<Json<Context>, AppError> {
    let user = state.require_user(&headers)?;
    owned_context(&state, &user, &id)?;
    let updated = state
        .store
        .update_context(&id, req)?
        .ok_or_else(|| not_found("Context not found"))?;
    Ok(Json(updated))
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

async fn handle_delete_context(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let user = state.require_user(&headers)?;
    owned_context(&state, &user, &id)?;
    let success = state.store.delete_context(&id)?;
    Ok(Json(SuccessResponse { success }))
}

// ============ File API ============

async fn handle_create_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<CreateFileRequest>,
) -> Result<Json<ContextFile>, AppError> {
    let user = state.require_user(&headers)?;
    owned_context(&state, &user, &id)?;
    validate_file_name(&req.name)?;
    let file = state
        .store
        .add_file(&id, req)?
        .ok_or_else(|| not_found("Context not found"))?;
    Ok(Json(file))
}

async fn handle_update_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, name)): Path<(String, String)>,
    Json(req): Json<UpdateFileRequest>,
) -> Result<Json<ContextFile>, AppError> {
    let user = state.require_user(&headers)?;
    owned_context(&state, &user, &id)?;
    let file = state
        .store
        .update_file(&id, &name, req)?
        .ok_or_else(|| not_found("File not found"))?;
    Ok(Json(file))
}

async fn handle_delete_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<SuccessResponse>, AppError> {
    let user = state.require_user(&headers)?;
    owned_context(&state, &user, &id)?;
    let success = state.store.remove_file(&id, &name)?;
    Ok(Json(SuccessResponse { success }))
}

// ============ Contributor toggle ============

#[derive(Serialize)]
struct ToggleResponse {
    context: Context,
    updated_file: Option<ContextFile>,
    contributor_login: String,
    contributor_selected: bool,
}

/// Handler for `POST /api/contexts/{id}/contributors/{login}/toggle`.
///
/// Flips the contributor's selection and regenerates `people.md` from the
/// updated roster. The people document is update-only here: when it has been
/// deleted, the toggle still succeeds and `updated_file` is null.
async fn handle_toggle_contributor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, login)): Path<(String, String)>,
) -> Result<Json<ToggleResponse>, AppError> {
    let user = state.require_user(&headers)?;
    owned_context(&state, &user, &id)?;

    let (toggled, selected) = state
        .store
        .toggle_contributor(&id, &login)?
        .ok_or_else(|| not_found("Contributor not found"))?;

    let updated_file = state.store.update_file(
        &id,
        "people.md",
        UpdateFileRequest {
            content: generate::people_content(&toggled),
        },
    )?;

    let refreshed = state
        .store
        .get_context(&id)
        .ok_or_else(|| not_found("Context not found"))?;
    Ok(Json(ToggleResponse {
        context: refreshed,
        updated_file,
        contributor_login: login,
        contributor_selected: selected,
    }))
}

// ============ Publish ============

#[derive(Serialize)]
struct PublishResponse {
    pr_url: String,
}

/// Handler for `POST /api/contexts/{id}/create-pr`.
async fn handle_create_pr(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<PublishResponse>, AppError> {
    let user = state.require_user(&headers)?;
    let context = owned_context(&state, &user, &id)?;

    let github = state.github_client(&user)?;
    let pr_url = publish::publish_context(&github, &context, &user.login).await?;
    Ok(Json(PublishResponse { pr_url }))
}

// ============ Repository listing ============

/// Handler for `GET /api/user/repositories-with-contexts`.
///
/// Lists every repository the caller can reach and marks the ones already
/// linked to one of their contexts.
async fn handle_list_repositories(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RepoSummary>>, AppError> {
    let user = state.require_user(&headers)?;
    let github = state.github_client(&user)?;

    let mut repos = github
        .user_repositories()
        .await
        .map_err(|e| internal(format!("Error fetching repositories: {}", e)))?;

    let urls: Vec<String> = repos.iter().map(|r| r.html_url.clone()).collect();
    let linked = state.store.contexts_for_repo_urls(&user.owner_id(), &urls);
    for repo in &mut repos {
        if let Some(context_id) = linked.get(&repo.html_url) {
            repo.has_context = true;
            repo.context_id = Some(context_id.clone());
        }
    }

    Ok(Json(repos))
}
