// Channel message endpoint (mention chains)

use axum::{
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::post,
    Json, Router,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::agents::{ChainResolver, MentionParser};
use crate::db::{DatabaseOperations, NewMessage};
use crate::middleware::AuthedUser;
use crate::models::{AppState, SendMessageRequest, SendMessageResponse};
use crate::realtime::MessageEvent;
use crate::types::{AppError, AppResult, ContentType, MentionType};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/channels/{channel_id}/messages", post(post_channel_message))
        .with_state(state)
}

/// Post to a channel. Mentioned agents respond in mention order: the first
/// inline, the rest through the chain continuation job.
async fn post_channel_message(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    auth: AuthedUser,
    Json(request): Json<SendMessageRequest>,
) -> AppResult<ResponseJson<SendMessageResponse>> {
    request
        .validate()
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

    let user_id = auth.user_id;

    let channel = DatabaseOperations::get_channel(&state.pool, channel_id).await?;
    if !DatabaseOperations::is_channel_member(&state.pool, channel.id, user_id).await? {
        return Err(AppError::AccessDenied(
            "not a member of this channel".to_string(),
        ));
    }

    let user_message = DatabaseOperations::create_message(
        &state.pool,
        NewMessage {
            channel_id: Some(channel.id),
            user_id: Some(user_id),
            role: "user".to_string(),
            content: request.text.clone(),
            attachments: (!request.attachments.is_empty()).then(|| request.attachments.clone()),
            client_message_id: request.client_message_id.clone(),
            ..Default::default()
        },
    )
    .await?;
    state
        .events
        .publish(MessageEvent::inserted(user_message.clone()))
        .await;

    let agents = DatabaseOperations::get_channel_agents(&state.pool, channel.id).await?;
    let mentions = MentionParser::default().parse(&request.text, &agents);
    info!(
        channel = %channel.name,
        mention_count = mentions.len(),
        "Channel message received"
    );

    let mention_type = match mentions.len() {
        0 => None,
        1 => Some(MentionType::Mention),
        _ => Some(MentionType::Chain),
    };

    let primary =
        ChainResolver::process(&state, channel.id, user_id, &user_message, mentions).await?;

    let response = match primary {
        Some(assistant) => SendMessageResponse {
            text: assistant.content.clone(),
            message_id: assistant.id,
            conversation_id: None,
            channel_id: Some(channel.id),
            content_type: assistant.content_type(),
            mention_type,
        },
        // No agent mentioned: plain channel message, nothing generates.
        None => SendMessageResponse {
            text: String::new(),
            message_id: user_message.id,
            conversation_id: None,
            channel_id: Some(channel.id),
            content_type: ContentType::Text,
            mention_type: None,
        },
    };

    Ok(Json(response))
}
