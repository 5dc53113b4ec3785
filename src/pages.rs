//! Server-rendered HTML pages.
//!
//! Thin askama templates over the same store the JSON API reads. Pages that
//! mutate do so through the API from small inline scripts, so the gates in
//! [`crate::server`] stay the single enforcement point for writes; the read
//! gates (visibility, ownership) are applied here before rendering.

use askama::Template;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::models::Context;
use crate::server::{forbidden, internal, not_found, AppError, AppState};
use crate::session::SessionUser;

fn render<T: Template>(template: T) -> Result<Response, AppError> {
    template
        .render()
        .map(|html| Html(html).into_response())
        .map_err(|e| internal(e.to_string()))
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    user: Option<SessionUser>,
}

pub async fn handle_index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user = state.current_user(&headers);
    render(IndexTemplate { user })
}

#[derive(Template)]
#[template(path = "contexts.html")]
struct ContextsTemplate {
    user: Option<SessionUser>,
    user_contexts: Vec<Context>,
    public_contexts: Vec<Context>,
}

pub async fn handle_contexts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user = state.current_user(&headers);
    let (user_contexts, public_contexts) = match &user {
        Some(u) => {
            let owner_id = u.owner_id();
            let own = state.store.contexts_for_owner(&owner_id);
            let public = state
                .store
                .public_contexts()
                .into_iter()
                .filter(|c| c.owner_id != owner_id)
                .collect();
            (own, public)
        }
        None => (Vec::new(), state.store.public_contexts()),
    };
    render(ContextsTemplate {
        user,
        user_contexts,
        public_contexts,
    })
}

#[derive(Template)]
#[template(path = "new_context.html")]
struct NewContextTemplate {
    user: Option<SessionUser>,
}

pub async fn handle_new_context(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user = state.require_user(&headers)?;
    render(NewContextTemplate { user: Some(user) })
}

#[derive(Template)]
#[template(path = "context_detail.html")]
struct ContextDetailTemplate {
    user: Option<SessionUser>,
    context: Context,
    can_edit: bool,
}

pub async fn handle_context_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let context = state
        .store
        .get_context(&id)
        .ok_or_else(|| not_found("Context not found"))?;
    let user = state.current_user(&headers);
    if !crate::server::visible_to(&context, user.as_ref()) {
        return Err(forbidden("Access denied"));
    }
    let can_edit = user
        .as_ref()
        .is_some_and(|u| u.owner_id() == context.owner_id);
    render(ContextDetailTemplate {
        user,
        context,
        can_edit,
    })
}

#[derive(Template)]
#[template(path = "edit_context.html")]
struct EditContextTemplate {
    user: Option<SessionUser>,
    context: Context,
}

pub async fn handle_edit_context(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let user = state.require_user(&headers)?;
    let context = state
        .store
        .get_context(&id)
        .ok_or_else(|| not_found("Context not found"))?;
    if user.owner_id() != context.owner_id {
        return Err(forbidden("Access denied"));
    }
    render(EditContextTemplate {
        user: Some(user),
        context,
    })
}

#[derive(Template)]
#[template(path = "profile.html")]
struct ProfileTemplate {
    user: Option<SessionUser>,
    contexts: Vec<Context>,
}

/// Anonymous visitors get bounced to `/login` rather than a 401 page.
pub async fn handle_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user = match state.current_user(&headers) {
        Some(user) => user,
        None => return Ok(Redirect::to("/login").into_response()),
    };
    let contexts = state.store.contexts_for_owner(&user.owner_id());
    render(ProfileTemplate {
        user: Some(user),
        contexts,
    })
}

#[derive(Template)]
#[template(path = "repositories.html")]
struct RepositoriesTemplate {
    user: Option<SessionUser>,
}

pub async fn handle_repositories(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user = state.require_user(&headers)?;
    render(RepositoriesTemplate { user: Some(user) })
}
