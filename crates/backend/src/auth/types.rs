//! Auth-related types and configuration.

use serde::{Deserialize, Serialize};
use shared_types::User;
use uuid::Uuid;

/// Claims carried by the signed session cookie.
///
/// The cookie only names the server-side session; the user is looked up from
/// the session row on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Session id (primary key of the `sessions` row)
    pub sid: Uuid,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// The user behind a valid session. Used as an extractor on protected routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub User);

/// Auth configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret used to sign session cookies
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub cookie_name: String,
    /// Add `Secure` to cookies (set when `RUST_ENV=production`)
    pub cookie_secure: bool,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_callback_url: String,
    pub success_redirect: String,
    pub failure_redirect: String,
}
