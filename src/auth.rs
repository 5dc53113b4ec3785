//! GitHub OAuth login flow.
//!
//! `GET /login` sends the browser to GitHub's authorize page with a random
//! `state` nonce mirrored in a short-lived signed cookie. `GET /callback`
//! checks the nonce, exchanges the code for an access token, fetches the
//! user's profile (and primary email when the public one is hidden), and
//! sets the session cookie. Any failure in the exchange collapses to a 400
//! "Authentication failed" so upstream details never leak to the browser.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use crate::config::OAuthCredentials;
use crate::github::GitHubClient;
use crate::server::{bad_request, internal, AppError, AppState};
use crate::session::{self, SessionUser, OAUTH_STATE_COOKIE};

const OAUTH_SCOPE: &str = "user:email repo read:org";

fn set_cookie(response: &mut Response, cookie: &str) -> Result<(), AppError> {
    let value = HeaderValue::from_str(cookie).map_err(|e| internal(e.to_string()))?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(())
}

/// Handler for `GET /login`.
pub async fn handle_login(State(state): State<AppState>) -> Result<Response, AppError> {
    let creds = OAuthCredentials::from_env().map_err(|e| internal(e.to_string()))?;

    let nonce = Uuid::new_v4().to_string();
    let redirect_uri = format!("{}/callback", state.config.server.app_url);
    let authorize = reqwest::Url::parse_with_params(
        &format!("{}/authorize", state.config.github.oauth_base),
        &[
            ("client_id", creds.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("scope", OAUTH_SCOPE),
            ("state", nonce.as_str()),
        ],
    )
    .map_err(|e| internal(e.to_string()))?;

    let signed = session::sign_value(&state.session_secret, nonce.as_bytes());
    let mut response = Redirect::to(authorize.as_str()).into_response();
    set_cookie(&mut response, &session::state_cookie_header(&signed))?;
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Handler for `GET /callback`.
pub async fn handle_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    match callback_inner(&state, &headers, query).await {
        Ok(user) => {
            let cookie = session::encode_session(&state.session_secret, &user)
                .map_err(|e| internal(e.to_string()))?;
            let mut response = Redirect::to("/").into_response();
            set_cookie(&mut response, &session::session_cookie_header(&cookie))?;
            set_cookie(&mut response, &session::clear_state_cookie_header())?;
            Ok(response)
        }
        Err(e) => {
            eprintln!("Warning: OAuth callback failed: {}", e);
            Err(bad_request("Authentication failed"))
        }
    }
}

async fn callback_inner(
    state: &AppState,
    headers: &HeaderMap,
    query: CallbackQuery,
) -> anyhow::Result<SessionUser> {
    let code = query.code.as_deref().unwrap_or("");
    let nonce = query.state.as_deref().unwrap_or("");
    if code.is_empty() || nonce.is_empty() {
        anyhow::bail!("missing code or state parameter");
    }

    // The state cookie must carry this exact nonce under our signature.
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let raw_state = session::cookie_value(cookie_header, OAUTH_STATE_COOKIE)
        .ok_or_else(|| anyhow::anyhow!("missing state cookie"))?;
    let expected = session::verify_value(&state.session_secret, raw_state)
        .ok_or_else(|| anyhow::anyhow!("invalid state cookie"))?;
    if expected != nonce.as_bytes() {
        anyhow::bail!("state mismatch");
    }

    let creds = OAuthCredentials::from_env()?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(state.config.github.timeout_secs))
        .build()?;
    let resp = http
        .post(format!("{}/access_token", state.config.github.oauth_base))
        .header("Accept", "application/json")
        .form(&[
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("code", code),
        ])
        .send()
        .await?;
    if !resp.status().is_success() {
        anyhow::bail!("token endpoint returned {}", resp.status());
    }
    let token: TokenResponse = resp.json().await?;
    let access_token = token
        .access_token
        .ok_or_else(|| anyhow::anyhow!("no access token in response"))?;

    let github = GitHubClient::new(&state.config.github, access_token.clone())?;
    let profile = github.current_user().await?;
    let email = match profile.email {
        Some(email) => Some(email),
        None => github.user_primary_email().await.unwrap_or(None),
    };

    Ok(SessionUser {
        id: profile.id,
        login: profile.login,
        name: profile.name,
        email,
        avatar_url: profile.avatar_url,
        access_token,
    })
}

/// Handler for `GET /logout`.
pub async fn handle_logout() -> Result<Response, AppError> {
    let mut response = Redirect::to("/").into_response();
    set_cookie(&mut response, &session::clear_session_cookie_header())?;
    Ok(response)
}
