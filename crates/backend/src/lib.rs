//! Google login backend with server-side sessions and a support-request
//! relay to a customer-messaging service.

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod relay;
pub mod repository;
pub mod routes;
mod schema;

#[cfg(test)]
mod test_support;

use auth::provider::IdentityProvider;
use auth::session::SessionManager;
use auth::types::AuthConfig;
use relay::MessagingClient;
use repository::{SessionStore, UserStore};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth_config: Arc<AuthConfig>,
    pub users: Arc<dyn UserStore>,
    pub sessions: SessionManager,
    pub identity: Arc<dyn IdentityProvider>,
    pub messaging: Arc<dyn MessagingClient>,
}

impl AppState {
    pub fn new(
        auth_config: AuthConfig,
        users: Arc<dyn UserStore>,
        session_store: Arc<dyn SessionStore>,
        identity: Arc<dyn IdentityProvider>,
        messaging: Arc<dyn MessagingClient>,
    ) -> Self {
        let sessions = SessionManager::new(users.clone(), session_store, &auth_config);
        Self {
            auth_config: Arc::new(auth_config),
            users,
            sessions,
            identity,
            messaging,
        }
    }
}
