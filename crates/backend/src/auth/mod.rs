//! Google OAuth login and cookie-backed server sessions.
//!
//! This module provides:
//! - The OAuth handshake against an `IdentityProvider`
//! - Session establishment, resolution and teardown
//! - The `AuthUser` extractor for protecting routes

mod handlers;
mod middleware;
pub mod provider;
pub mod session;
pub mod types;

pub use handlers::{google_callback, google_login, logout, me};
pub use middleware::{build_cookie, extract_auth_user, extract_cookie};
