//! Fakes and helpers shared by handler tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use shared_types::{SupportMessage, User};
use tower::ServiceExt;

use crate::auth::provider::{IdentityProvider, ProviderError, ProviderProfile};
use crate::auth::types::AuthConfig;
use crate::models::NewUser;
use crate::relay::{MessageListing, MessagingClient, OutboundMessage, RelayError};
use crate::repository::memory::{MemorySessionStore, MemoryUserStore};
use crate::repository::UserStore;
use crate::AppState;

pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        session_secret: "test-secret-key-for-testing-only".to_string(),
        session_ttl_hours: 24,
        cookie_name: "sid".to_string(),
        cookie_secure: false,
        google_client_id: "test-client-id".to_string(),
        google_client_secret: "test-client-secret".to_string(),
        google_callback_url: "http://localhost:5000/auth/google/callback".to_string(),
        success_redirect: "/".to_string(),
        failure_redirect: "/".to_string(),
    }
}

#[derive(Default)]
pub struct FakeIdentityProvider {
    profile: Mutex<Option<ProviderProfile>>,
    failing: AtomicBool,
    codes: Mutex<Vec<String>>,
}

impl FakeIdentityProvider {
    pub fn set_profile(&self, profile: ProviderProfile) {
        *self.profile.lock().unwrap() = Some(profile);
    }

    pub fn set_failure(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn exchanged_codes(&self) -> Vec<String> {
        self.codes.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    fn authorize_url(&self, state: &str) -> String {
        format!("https://provider.test/consent?state={}", state)
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderProfile, ProviderError> {
        self.codes.lock().unwrap().push(code.to_string());

        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::TokenExchange {
                status: reqwest::StatusCode::BAD_REQUEST,
                body: "invalid_grant".to_string(),
            });
        }

        self.profile
            .lock()
            .unwrap()
            .clone()
            .ok_or(ProviderError::MissingEmail)
    }
}

/// Records outbound messages and serves a canned listing.
#[derive(Default)]
pub struct FakeMessaging {
    sent: Mutex<Vec<OutboundMessage>>,
    listing: Mutex<MessageListing>,
    failure: Mutex<Option<String>>,
    list_calls: AtomicUsize,
}

impl FakeMessaging {
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_listing(&self, messages: Vec<SupportMessage>, truncated: bool) {
        *self.listing.lock().unwrap() = MessageListing {
            messages,
            truncated,
        };
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn failure(&self) -> Option<RelayError> {
        self.failure
            .lock()
            .unwrap()
            .clone()
            .map(|message| RelayError::Status {
                status: 503,
                message,
            })
    }
}

#[async_trait]
impl MessagingClient for FakeMessaging {
    async fn create_message(&self, message: &OutboundMessage) -> Result<(), RelayError> {
        if let Some(err) = self.failure() {
            return Err(err);
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn list_messages(&self) -> Result<MessageListing, RelayError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failure() {
            return Err(err);
        }
        Ok(self.listing.lock().unwrap().clone())
    }
}

/// An `AppState` wired to in-memory stores and fakes, with handles kept for
/// assertions.
pub struct TestApp {
    pub auth_config: AuthConfig,
    pub users: Arc<MemoryUserStore>,
    pub sessions: Arc<MemorySessionStore>,
    pub identity: Arc<FakeIdentityProvider>,
    pub messaging: Arc<FakeMessaging>,
}

impl TestApp {
    pub fn new() -> Self {
        Self {
            auth_config: test_auth_config(),
            users: Arc::new(MemoryUserStore::default()),
            sessions: Arc::new(MemorySessionStore::default()),
            identity: Arc::new(FakeIdentityProvider::default()),
            messaging: Arc::new(FakeMessaging::default()),
        }
    }

    pub fn set_failure_redirect(&mut self, location: &str) {
        self.auth_config.failure_redirect = location.to_string();
    }

    pub fn state(&self) -> AppState {
        AppState::new(
            self.auth_config.clone(),
            self.users.clone(),
            self.sessions.clone(),
            self.identity.clone(),
            self.messaging.clone(),
        )
    }

    pub fn router(&self) -> Router {
        crate::routes::build_router(self.state(), None)
    }

    /// Create a user and a session for it, returning the `Cookie` header value.
    pub async fn login(&self, google_id: &str) -> (User, String) {
        let name = format!("User {}", google_id);
        let email = format!("{}@example.com", google_id);
        let user = self
            .users
            .upsert(NewUser {
                google_id,
                name: &name,
                email: &email,
            })
            .await
            .unwrap();

        let token = self.state().sessions.establish(&user).await.unwrap();
        let cookie = format!("{}={}", self.auth_config.cookie_name, token);
        (user, cookie)
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.router()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn post_json(
        &self,
        uri: &str,
        cookie: Option<&str>,
        body: serde_json::Value,
    ) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.router()
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap()
    }
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

