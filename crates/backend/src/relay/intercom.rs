//! Intercom REST client for the support relay.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use shared_types::{MessageParty, SupportMessage};
use thiserror::Error;

const INTERCOM_VERSION: &str = "2.11";

#[derive(Debug, Clone)]
pub struct IntercomConfig {
    pub access_token: String,
    /// Admin that receives relayed requests
    pub admin_id: String,
    /// Base URL without trailing slash
    pub api_url: String,
    pub page_size: u32,
    /// Upper bound on pages fetched per listing
    pub max_pages: u32,
}

/// A support request on its way out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub subject: String,
    pub body: String,
    /// Local id of the submitting user
    pub sender_id: String,
}

/// All messages the service returned, and whether the page cap cut the
/// listing short.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageListing {
    pub messages: Vec<SupportMessage>,
    pub truncated: bool,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Messaging service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Messaging service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response from messaging service: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn create_message(&self, message: &OutboundMessage) -> Result<(), RelayError>;

    async fn list_messages(&self) -> Result<MessageListing, RelayError>;
}

#[derive(Debug, Serialize)]
struct CreateMessageBody<'a> {
    message_type: &'static str,
    subject: &'a str,
    body: &'a str,
    from: MessageParty,
    to: MessageParty,
}

#[derive(Debug, Deserialize)]
struct MessagePage {
    #[serde(default)]
    messages: Vec<SupportMessage>,
    #[serde(default)]
    pages: Option<Pages>,
}

#[derive(Debug, Deserialize)]
struct Pages {
    #[serde(default)]
    next: Option<NextPage>,
}

#[derive(Debug, Deserialize)]
struct NextPage {
    #[serde(default)]
    starting_after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorList {
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub struct IntercomClient {
    http: reqwest::Client,
    config: IntercomConfig,
}

impl IntercomClient {
    pub fn new(http: reqwest::Client, config: IntercomConfig) -> Self {
        Self { http, config }
    }

    async fn fetch_page(&self, starting_after: Option<&str>) -> Result<MessagePage, RelayError> {
        let mut query = vec![("per_page", self.config.page_size.to_string())];
        if let Some(cursor) = starting_after {
            query.push(("starting_after", cursor.to_string()));
        }

        let response = self
            .http
            .get(format!("{}/messages", self.config.api_url))
            .bearer_auth(&self.config.access_token)
            .header(ACCEPT, "application/json")
            .header("Intercom-Version", INTERCOM_VERSION)
            .query(&query)
            .send()
            .await?;

        let body = check_status(response).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MessagingClient for IntercomClient {
    async fn create_message(&self, message: &OutboundMessage) -> Result<(), RelayError> {
        let payload = CreateMessageBody {
            message_type: "inapp",
            subject: &message.subject,
            body: &message.body,
            from: MessageParty::user(message.sender_id.clone()),
            to: MessageParty::admin(self.config.admin_id.clone()),
        };

        let response = self
            .http
            .post(format!("{}/messages", self.config.api_url))
            .bearer_auth(&self.config.access_token)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header("Intercom-Version", INTERCOM_VERSION)
            .json(&payload)
            .send()
            .await?;

        check_status(response).await?;
        tracing::info!(
            "Relayed message from user {} with subject {:?}",
            message.sender_id,
            message.subject
        );
        Ok(())
    }

    async fn list_messages(&self) -> Result<MessageListing, RelayError> {
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..self.config.max_pages {
            let page = self.fetch_page(cursor.as_deref()).await?;
            messages.extend(page.messages);

            cursor = page
                .pages
                .and_then(|p| p.next)
                .and_then(|n| n.starting_after);

            if cursor.is_none() {
                return Ok(MessageListing {
                    messages,
                    truncated: false,
                });
            }
        }

        tracing::warn!(
            "Message listing truncated after {} pages ({} messages); results are incomplete",
            self.config.max_pages,
            messages.len()
        );

        Ok(MessageListing {
            messages,
            truncated: true,
        })
    }
}

/// Return the body of a successful response, or turn an error response into
/// `RelayError::Status` carrying the service's own error messages.
async fn check_status(response: reqwest::Response) -> Result<String, RelayError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return Ok(body);
    }

    Err(RelayError::Status {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<ErrorList>(body).ok();
    let messages: Vec<String> = parsed
        .map(|list| list.errors)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|e| e.message.or(e.code))
        .collect();

    if messages.is_empty() {
        body.trim().to_string()
    } else {
        messages.join("; ")
    }
}
