use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// User struct matching database column order exactly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct User {
    pub id: Uuid,
    pub google_id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Current user as returned by `GET /api/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<User> for AuthUserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

/// Body of `POST /api/requests`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportRequest {
    pub category: String,
    #[serde(default)]
    pub comments: String,
}

/// One side of a relayed conversation ("user" or "admin")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageParty {
    #[serde(rename = "type")]
    pub party_type: String,
    pub id: String,
}

impl MessageParty {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            party_type: "user".to_string(),
            id: id.into(),
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            party_type: "admin".to_string(),
            id: id.into(),
        }
    }
}

/// A message as known to the customer-messaging service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportMessage {
    pub id: String,
    /// Empty when the service sends no subject (only email messages carry one)
    #[serde(default, deserialize_with = "null_as_empty")]
    pub subject: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub body: String,
    #[serde(default)]
    pub message_type: Option<String>,
    /// Unix timestamp (seconds)
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub from: Option<MessageParty>,
    #[serde(default)]
    pub to: Option<MessageParty>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_support_request_comments_default_to_empty() {
        let req: SupportRequest = serde_json::from_str(r#"{"category":"billing"}"#).unwrap();
        assert_eq!(req.category, "billing");
        assert_eq!(req.comments, "");
    }

    #[test]
    fn test_support_request_requires_category() {
        let result = serde_json::from_str::<SupportRequest>(r#"{"comments":"help"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_message_party_serializes_type_field() {
        let json = serde_json::to_value(MessageParty::admin("42")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "admin", "id": "42"}));
    }

    #[test]
    fn test_support_message_tolerates_missing_fields() {
        let msg: SupportMessage = serde_json::from_str(r#"{"id":"m1","subject":"billing"}"#).unwrap();
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.subject, "billing");
        assert_eq!(msg.body, "");
        assert!(msg.from.is_none());
    }

    #[test]
    fn test_support_message_null_subject_and_body_are_empty() {
        let msg: SupportMessage = serde_json::from_str(
            r#"{"id":"m1","subject":null,"body":null,"message_type":"inapp"}"#,
        )
        .unwrap();
        assert_eq!(msg.subject, "");
        assert_eq!(msg.body, "");
        assert_eq!(msg.message_type.as_deref(), Some("inapp"));
    }
}
