use axum::{
    extract::{Json, Path, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use shared_types::SupportRequest;

use crate::auth::types::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

use super::{lookup_category, OutboundMessage};

pub const TRUNCATED_HEADER: HeaderName = HeaderName::from_static("x-results-truncated");

/// Relay a support request from the logged-in user to the messaging service.
pub async fn submit_request(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<SupportRequest>,
) -> ApiResult<(StatusCode, &'static str)> {
    if payload.category.trim().is_empty() {
        return Err(ApiError::bad_request("category must not be empty"));
    }

    let message = OutboundMessage {
        subject: payload.category,
        body: payload.comments,
        sender_id: user.id.to_string(),
    };

    state
        .messaging
        .create_message(&message)
        .await
        .map_err(ApiError::upstream)?;

    Ok((StatusCode::OK, "Request submitted"))
}

/// List relayed messages whose subject is exactly `category`.
pub async fn list_requests(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(category): Path<String>,
) -> ApiResult<Response> {
    let listing = lookup_category(state.messaging.as_ref(), &category)
        .await
        .map_err(ApiError::upstream)?;

    let mut response = Json(listing.messages).into_response();
    if listing.truncated {
        response
            .headers_mut()
            .insert(TRUNCATED_HEADER, HeaderValue::from_static("true"));
    }

    Ok(response)
}
