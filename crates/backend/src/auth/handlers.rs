//! Authentication HTTP handlers.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use shared_types::{AuthUserResponse, User};
use thiserror::Error;

use crate::error::ApiResult;
use crate::models::NewUser;
use crate::AppState;

use super::middleware::{build_cookie, extract_cookie};
use super::provider::{ProviderError, ProviderProfile};
use super::session::SessionError;
use super::types::AuthUser;

pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
const OAUTH_STATE_PATH: &str = "/auth/google";
const OAUTH_STATE_MAX_AGE_SECS: i64 = 600;

/// Why a login handshake did not produce a session.
#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("Provider returned an error: {0}")]
    Denied(String),

    #[error("Callback is missing the authorization code")]
    MissingCode,

    #[error("OAuth state is missing or does not match")]
    StateMismatch,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Failed to store user: {0}")]
    Store(#[from] anyhow::Error),

    #[error("Failed to establish session: {0}")]
    Session(#[from] SessionError),
}

#[derive(Debug, Deserialize)]
pub struct AuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Start Google OAuth login: remember a CSRF state and send the browser to
/// the consent screen.
pub async fn google_login(State(state): State<AppState>) -> Response {
    let csrf_state = uuid::Uuid::new_v4().to_string();
    let auth_url = state.identity.authorize_url(&csrf_state);

    let state_cookie = build_cookie(
        OAUTH_STATE_COOKIE,
        &csrf_state,
        OAUTH_STATE_PATH,
        OAUTH_STATE_MAX_AGE_SECS,
        state.auth_config.cookie_secure,
    );

    redirect_with_cookies(&auth_url, &[state_cookie])
}

/// Handle the Google OAuth callback.
///
/// On success the user is upserted, a session is established and the browser
/// is redirected with the session cookie. Any failure redirects to the
/// configured failure destination without a session.
pub async fn google_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AuthCallbackParams>,
) -> Response {
    let config = &state.auth_config;
    let clear_state = build_cookie(
        OAUTH_STATE_COOKIE,
        "",
        OAUTH_STATE_PATH,
        0,
        config.cookie_secure,
    );

    match complete_handshake(&state, &headers, params).await {
        Ok(token) => {
            let session_cookie = build_cookie(
                &config.cookie_name,
                &token,
                "/",
                state.sessions.ttl().num_seconds(),
                config.cookie_secure,
            );
            redirect_with_cookies(&config.success_redirect, &[session_cookie, clear_state])
        }
        Err(e) => {
            tracing::error!("Auth callback error: {}", e);
            redirect_with_cookies(&config.failure_redirect, &[clear_state])
        }
    }
}

async fn complete_handshake(
    state: &AppState,
    headers: &HeaderMap,
    params: AuthCallbackParams,
) -> Result<String, AuthFailure> {
    if let Some(error) = params.error {
        return Err(AuthFailure::Denied(error));
    }

    let expected = extract_cookie(headers, OAUTH_STATE_COOKIE);
    match (expected, params.state) {
        (Some(expected), Some(actual)) if expected == actual => {}
        _ => return Err(AuthFailure::StateMismatch),
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(AuthFailure::MissingCode)?;

    let profile = state.identity.exchange_code(&code).await?;
    tracing::info!("OAuth login attempt from: {}", profile.email);

    let user = upsert_profile(state, &profile).await?;

    // A browser that was already logged in gets a fresh session.
    if let Some(previous) = extract_cookie(headers, &state.auth_config.cookie_name) {
        if let Err(e) = state.sessions.destroy(&previous).await {
            tracing::debug!("Ignoring stale session on login: {}", e);
        }
    }

    let token = state.sessions.establish(&user).await?;
    tracing::info!("Successful login for: {}", user.email);

    Ok(token)
}

/// Find-or-create the local user for a provider profile. The latest profile
/// wins; a missing display name falls back to the email address.
async fn upsert_profile(state: &AppState, profile: &ProviderProfile) -> anyhow::Result<User> {
    let name = profile.display_name.as_deref().unwrap_or(&profile.email);

    state
        .users
        .upsert(NewUser {
            google_id: &profile.provider_id,
            name,
            email: &profile.email,
        })
        .await
}

/// Logout - drop the server-side session and clear the cookie.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let config = &state.auth_config;

    if let Some(token) = extract_cookie(&headers, &config.cookie_name) {
        if let Err(e) = state.sessions.destroy(&token).await {
            tracing::debug!("Logout with unusable session: {}", e);
        }
    }

    let cookie = build_cookie(&config.cookie_name, "", "/", 0, config.cookie_secure);
    redirect_with_cookies("/", &[cookie])
}

/// Get current authenticated user info.
pub async fn me(AuthUser(user): AuthUser) -> ApiResult<Json<AuthUserResponse>> {
    Ok(Json(user.into()))
}

fn redirect_with_cookies(location: &str, cookies: &[String]) -> Response {
    let mut headers = HeaderMap::new();

    match HeaderValue::from_str(location) {
        Ok(value) => {
            headers.insert(header::LOCATION, value);
        }
        Err(e) => {
            tracing::error!("Invalid redirect location {:?}: {}", location, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    for cookie in cookies {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => {
                tracing::error!("Invalid cookie value: {}", e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    (StatusCode::SEE_OTHER, headers).into_response()
}
