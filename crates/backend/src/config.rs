use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

use crate::auth::types::AuthConfig;
use crate::relay::IntercomConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub database_pool_size: usize,
    pub http_timeout: Duration,
    /// `None` means permissive CORS
    pub cors_allowed_origins: Option<Vec<String>>,
    pub auth: AuthConfig,
    pub intercom: IntercomConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the process environment
    /// in production, a map in tests).
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = parse_or(&var, "PORT", 5000)?;

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let auth = AuthConfig {
            session_secret: required(&var, "SESSION_SECRET")?,
            session_ttl_hours: parse_or(&var, "SESSION_TTL_HOURS", 168)?,
            cookie_name: var("SESSION_COOKIE_NAME").unwrap_or_else(|| "sid".to_string()),
            cookie_secure: var("RUST_ENV").as_deref() == Some("production"),
            google_client_id: required(&var, "GOOGLE_CLIENT_ID")?,
            google_client_secret: required(&var, "GOOGLE_CLIENT_SECRET")?,
            google_callback_url: var("GOOGLE_CALLBACK_URL")
                .unwrap_or_else(|| format!("http://localhost:{}/auth/google/callback", port)),
            success_redirect: var("AUTH_SUCCESS_REDIRECT").unwrap_or_else(|| "/".to_string()),
            failure_redirect: var("AUTH_FAILURE_REDIRECT").unwrap_or_else(|| "/".to_string()),
        };

        if auth.session_ttl_hours <= 0 {
            anyhow::bail!("SESSION_TTL_HOURS must be positive");
        }
        chrono::Duration::try_hours(auth.session_ttl_hours)
            .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
            .context("SESSION_TTL_HOURS is too large")?;

        let intercom = IntercomConfig {
            access_token: required(&var, "INTERCOM_ACCESS_TOKEN")?,
            admin_id: required(&var, "INTERCOM_ADMIN_ID")?,
            api_url: var("INTERCOM_API_URL")
                .unwrap_or_else(|| "https://api.intercom.io".to_string())
                .trim_end_matches('/')
                .to_string(),
            page_size: parse_or(&var, "INTERCOM_PAGE_SIZE", 50)?,
            max_pages: parse_or(&var, "INTERCOM_MAX_PAGES", 20)?,
        };

        if intercom.max_pages == 0 {
            anyhow::bail!("INTERCOM_MAX_PAGES must be at least 1");
        }

        Ok(Self {
            port,
            database_url: required(&var, "DATABASE_URL")?,
            database_pool_size: parse_or(&var, "DATABASE_POOL_SIZE", 10)?,
            http_timeout: Duration::from_secs(parse_or(&var, "HTTP_TIMEOUT_SECS", 30)?),
            cors_allowed_origins,
            auth,
            intercom,
        })
    }
}

fn required<F>(var: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .filter(|value| !value.trim().is_empty())
        .with_context(|| format!("{} must be set", key))
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}
