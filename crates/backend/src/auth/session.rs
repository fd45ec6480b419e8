//! Server-side sessions referenced by a signed cookie.
//!
//! The session row stores only the user's store key. The cookie carries an
//! HS256 token naming the row, signed with `SESSION_SECRET`, so a forged or
//! guessed session id is rejected before the store is consulted.

use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use shared_types::User;
use thiserror::Error;
use uuid::Uuid;

use super::types::{AuthConfig, SessionClaims};
use crate::models::SessionRecord;
use crate::repository::{SessionStore, UserStore};

/// The minimal reference a session keeps to reload its user.
pub type SessionKey = Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid session token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Session not found")]
    Unknown,

    #[error("Session expired")]
    Expired,

    #[error("User {0} no longer exists")]
    UserNotFound(Uuid),

    #[error("Session store error: {0}")]
    Store(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct SessionManager {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            users,
            sessions,
            encoding_key: EncodingKey::from_secret(config.session_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.session_secret.as_bytes()),
            ttl: Duration::try_hours(config.session_ttl_hours).unwrap_or(Duration::MAX),
        }
    }

    /// Session lifetime, also used as the cookie's `Max-Age`.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn serialize(&self, user: &User) -> SessionKey {
        user.id
    }

    /// Reload the full user record for a session key.
    pub async fn deserialize(&self, key: SessionKey) -> Result<User, SessionError> {
        self.users
            .find_by_id(key)
            .await?
            .ok_or(SessionError::UserNotFound(key))
    }

    /// Create a session for `user` and return the signed cookie token.
    pub async fn establish(&self, user: &User) -> Result<String, SessionError> {
        let now = Utc::now();
        let record = SessionRecord {
            id: Uuid::new_v4(),
            user_id: self.serialize(user),
            created_at: now,
            expires_at: now
                .checked_add_signed(self.ttl)
                .ok_or_else(|| anyhow::anyhow!("Session lifetime is out of range"))?,
        };

        let record = self.sessions.insert(record).await?;
        tracing::debug!("Established session {} for user {}", record.id, user.id);

        let claims = SessionClaims {
            sid: record.id,
            iat: record.created_at.timestamp(),
            exp: record.expires_at.timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// Map a cookie token to the user it was issued for.
    ///
    /// Expired sessions and sessions whose user vanished are deleted on the way.
    pub async fn resolve(&self, token: &str) -> Result<User, SessionError> {
        let claims = self.verify(token, true)?;

        let record = self
            .sessions
            .find(claims.sid)
            .await?
            .ok_or(SessionError::Unknown)?;

        if record.is_expired(Utc::now()) {
            self.sessions.remove(record.id).await?;
            return Err(SessionError::Expired);
        }

        match self.deserialize(record.user_id).await {
            Err(SessionError::UserNotFound(user_id)) => {
                tracing::warn!(
                    "Session {} references missing user {}, removing it",
                    record.id,
                    user_id
                );
                self.sessions.remove(record.id).await?;
                Err(SessionError::UserNotFound(user_id))
            }
            other => other,
        }
    }

    /// Drop the server-side state behind a token. Idempotent.
    ///
    /// An expired token still identifies its row, so logout works after expiry.
    pub async fn destroy(&self, token: &str) -> Result<(), SessionError> {
        let claims = self.verify(token, false)?;
        self.sessions.remove(claims.sid).await?;
        tracing::debug!("Destroyed session {}", claims.sid);
        Ok(())
    }

    pub async fn purge_expired(&self) -> Result<usize, SessionError> {
        Ok(self.sessions.purge_expired(Utc::now()).await?)
    }

    fn verify(&self, token: &str, check_expiry: bool) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::default();
        validation.validate_exp = check_expiry;
        validation.leeway = 0;

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}
