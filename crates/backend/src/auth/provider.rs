//! Google OAuth2 authorization-code flow.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use super::types::AuthConfig;

/// Profile data returned by the identity provider after a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Stable provider-side user id
    pub provider_id: String,
    pub display_name: Option<String>,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Request to identity provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Token exchange failed: {status} - {body}")]
    TokenExchange { status: StatusCode, body: String },

    #[error("Profile request failed: {status} - {body}")]
    Profile { status: StatusCode, body: String },

    #[error("Provider profile has no email address")]
    MissingEmail,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL of the consent screen the browser is sent to.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchange an authorization code for the user's profile.
    async fn exchange_code(&self, code: &str) -> Result<ProviderProfile, ProviderError>;
}

/// Endpoint URLs, overridable for tests.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
        }
    }
}

pub struct GoogleProvider {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    endpoints: GoogleEndpoints,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: Option<String>,
    name: Option<String>,
}

impl GoogleProvider {
    pub fn new(http: reqwest::Client, config: &AuthConfig) -> Self {
        Self {
            http,
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: config.google_callback_url.clone(),
            endpoints: GoogleEndpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: GoogleEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.endpoints.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode("profile email"),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderProfile, ProviderError> {
        let token_response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !token_response.status().is_success() {
            let status = token_response.status();
            let body = token_response.text().await.unwrap_or_default();
            return Err(ProviderError::TokenExchange { status, body });
        }

        let tokens: GoogleTokenResponse = token_response.json().await?;

        let info_response = self
            .http
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(&tokens.access_token)
            .send()
            .await?;

        if !info_response.status().is_success() {
            let status = info_response.status();
            let body = info_response.text().await.unwrap_or_default();
            return Err(ProviderError::Profile { status, body });
        }

        let info: GoogleUserInfo = info_response.json().await?;
        let email = info
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or(ProviderError::MissingEmail)?;

        Ok(ProviderProfile {
            provider_id: info.id,
            display_name: info.name.filter(|n| !n.trim().is_empty()),
            email,
        })
    }
}
