// Message listing (poll fallback) and analysis retry

use axum::{
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::agents::analysis;
use crate::db::DatabaseOperations;
use crate::middleware::AuthedUser;
use crate::models::{AppState, ListMessagesQuery, Message, SendMessageResponse};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/messages", get(list_messages))
        .route("/api/messages/{message_id}/retry", post(retry_message))
        .with_state(state)
}

/// Poll surface: ordered messages for one scope, optionally after a
/// timestamp. The client reconciler dedupes against push delivery.
async fn list_messages(
    State(state): State<AppState>,
    auth: AuthedUser,
    Query(query): Query<ListMessagesQuery>,
) -> AppResult<ResponseJson<Vec<Message>>> {
    let user_id = auth.user_id;

    let messages = match (query.conversation_id, query.channel_id) {
        (Some(conversation_id), None) => {
            let conversation = DatabaseOperations::get_conversation(&state.pool, conversation_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("conversation {}", conversation_id)))?;
            if conversation.user_id != user_id {
                return Err(AppError::AccessDenied(
                    "conversation belongs to another user".to_string(),
                ));
            }
            DatabaseOperations::list_conversation_messages(
                &state.pool,
                conversation_id,
                query.after,
            )
            .await?
        }
        (None, Some(channel_id)) => {
            if !DatabaseOperations::is_channel_member(&state.pool, channel_id, user_id).await? {
                return Err(AppError::AccessDenied(
                    "not a member of this channel".to_string(),
                ));
            }
            DatabaseOperations::list_channel_messages(&state.pool, channel_id, query.after).await?
        }
        _ => {
            return Err(AppError::InvalidRequest(
                "exactly one of conversation_id or channel_id is required".to_string(),
            ))
        }
    };

    Ok(Json(messages))
}

/// Re-run a failed document analysis from the retry metadata persisted on
/// the error row.
async fn retry_message(
    State(state): State<AppState>,
    auth: AuthedUser,
    Path(message_id): Path<Uuid>,
) -> AppResult<ResponseJson<SendMessageResponse>> {
    let _user_id = auth.user_id;

    let message = DatabaseOperations::get_message(&state.pool, message_id).await?;
    let retried = analysis::retry_analysis(&state, &message).await?;

    Ok(Json(SendMessageResponse {
        text: retried.content.clone(),
        message_id: retried.id,
        conversation_id: retried.conversation_id,
        channel_id: retried.channel_id,
        content_type: retried.content_type(),
        mention_type: None,
    }))
}
