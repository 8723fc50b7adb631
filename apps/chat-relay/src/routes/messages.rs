//! Conversation history endpoint.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::message::StoredMessage;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/conversations/{conversation_id}/messages",
        get(list_messages),
    )
}

// ---------------------------------------------------------------------------
// GET /api/v1/conversations/{conversation_id}/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListMessagesParams {
    /// Only return messages with an id lower than this.
    pub before: Option<i64>,
    /// Page size, 1 to 100. Defaults to 50.
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListMessagesResponse {
    pub data: Vec<StoredMessage>,
    pub has_more: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations/{conversation_id}/messages",
    tag = "Messages",
    security(("bearer" = [])),
    params(
        ("conversation_id" = i64, Path, description = "Conversation ID"),
        ListMessagesParams,
    ),
    responses(
        (status = 200, description = "Messages, oldest first", body = ListMessagesResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Forbidden", body = ApiErrorBody),
    ),
)]
pub async fn list_messages(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Query(params): Query<ListMessagesParams>,
) -> Result<Json<ListMessagesResponse>, ApiError> {
    // Same fail-closed rule as the gateway: a failed lookup is a denial.
    let allowed = match state.access.is_member(conversation_id, user_id).await {
        Ok(allowed) => allowed,
        Err(err) => {
            tracing::warn!(conversation_id, user_id, error = %err, "conversation access lookup failed");
            false
        }
    };
    if !allowed {
        return Err(ApiError::forbidden("Not a member of this conversation"));
    }

    let limit = params.limit.unwrap_or(50).clamp(1, 100);

    let mut data = state
        .messages
        .history(conversation_id, params.before, limit + 1)
        .await?;

    // One extra row tells us whether an older page exists.
    let has_more = data.len() as i64 > limit;
    if has_more {
        data.remove(0);
    }

    Ok(Json(ListMessagesResponse { data, has_more }))
}
