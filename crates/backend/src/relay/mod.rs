//! Support request relay.
//!
//! Requests from logged-in users are forwarded to the customer-messaging
//! service and never stored locally. Category lookups list everything the
//! service knows and keep messages whose subject equals the category exactly.

pub mod handlers;
mod intercom;

pub use intercom::{
    IntercomClient, IntercomConfig, MessageListing, MessagingClient, OutboundMessage, RelayError,
};

use shared_types::SupportMessage;

/// Keep messages whose subject equals `category` (case-sensitive). Messages
/// without a subject never match.
pub fn filter_by_category(messages: Vec<SupportMessage>, category: &str) -> Vec<SupportMessage> {
    messages
        .into_iter()
        .filter(|m| !m.subject.is_empty() && m.subject == category)
        .collect()
}

/// List every message and filter it down to one category.
pub async fn lookup_category(
    client: &dyn MessagingClient,
    category: &str,
) -> Result<MessageListing, RelayError> {
    let listing = client.list_messages().await?;
    let total = listing.messages.len();
    let messages = filter_by_category(listing.messages, category);

    tracing::debug!(
        "Category {:?}: {} of {} messages match",
        category,
        messages.len(),
        total
    );

    Ok(MessageListing {
        messages,
        truncated: listing.truncated,
    })
}
