//! Session cookie handling and the `AuthUser` extractor for protected routes.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::error::ApiError;
use crate::AppState;

use super::types::AuthUser;

pub fn extract_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(cookie_header) = value.to_str() else {
            continue;
        };

        for cookie_str in cookie_header.split(';') {
            if let Ok(cookie) = cookie::Cookie::parse(cookie_str.trim()) {
                if cookie.name() == cookie_name && !cookie.value().is_empty() {
                    return Some(cookie.value().to_string());
                }
            }
        }
    }

    None
}

/// Build a `Set-Cookie` value. A `max_age` of 0 expires the cookie.
pub fn build_cookie(name: &str, value: &str, path: &str, max_age: i64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; Path={}; HttpOnly; SameSite=Lax; Max-Age={}{}",
        name, value, path, max_age, secure
    )
}

/// Resolve the session cookie on a request to its user.
///
/// Every failure (no cookie, bad signature, unknown or expired session,
/// vanished user, store outage) is reported as `Unauthorized`.
pub async fn extract_auth_user(headers: &HeaderMap, state: &AppState) -> Result<AuthUser, ApiError> {
    let token = extract_cookie(headers, &state.auth_config.cookie_name)
        .ok_or_else(ApiError::unauthorized)?;

    match state.sessions.resolve(&token).await {
        Ok(user) => Ok(AuthUser(user)),
        Err(e) => {
            tracing::debug!("Rejecting session: {}", e);
            Err(ApiError::unauthorized())
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        extract_auth_user(&parts.headers, state).await
    }
}
