// Conversation chat endpoint

use axum::{
    extract::State,
    response::Json as ResponseJson,
    routing::post,
    Json, Router,
};
use tracing::info;
use validator::Validate;

use crate::agents::{self, ChainFields, Scope};
use crate::db::{DatabaseOperations, NewMessage};
use crate::middleware::AuthedUser;
use crate::models::{AppState, SendMessageRequest, SendMessageResponse};
use crate::realtime::MessageEvent;
use crate::types::{AppError, AppResult, MentionType};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(post_chat))
        .with_state(state)
}

/// Send a message to a private agent conversation and get the assistant
/// reply (or, on the document-analysis path, a short acknowledgment).
async fn post_chat(
    State(state): State<AppState>,
    auth: AuthedUser,
    Json(request): Json<SendMessageRequest>,
) -> AppResult<ResponseJson<SendMessageResponse>> {
    request
        .validate()
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

    let user_id = auth.user_id;
    info!(user_id = %user_id, "Received chat request");

    // Resolve the conversation: an existing one must belong to the caller,
    // a new one is created idempotently on (user, agent, company).
    let (conversation, agent) = match request.conversation_id {
        Some(conversation_id) => {
            let conversation = DatabaseOperations::get_conversation(&state.pool, conversation_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("conversation {}", conversation_id)))?;
            if conversation.user_id != user_id {
                return Err(AppError::AccessDenied(
                    "conversation belongs to another user".to_string(),
                ));
            }
            let agent = DatabaseOperations::get_agent(&state.pool, conversation.agent_id).await?;
            (conversation, agent)
        }
        None => {
            let agent_id = request.agent_id.ok_or_else(|| {
                AppError::InvalidRequest(
                    "agent_id is required when starting a conversation".to_string(),
                )
            })?;
            let agent = DatabaseOperations::get_agent(&state.pool, agent_id).await?;
            let company_id = DatabaseOperations::get_user(&state.pool, user_id)
                .await?
                .and_then(|u| u.company_id)
                .unwrap_or(agent.company_id);
            let conversation = DatabaseOperations::get_or_create_conversation(
                &state.pool,
                user_id,
                agent_id,
                company_id,
            )
            .await?;
            (conversation, agent)
        }
    };

    let scope = Scope::Conversation(conversation.id);

    // Persist the user's message first; the optimistic client copy
    // reconciles against this row via client_message_id.
    let user_message = DatabaseOperations::create_message(
        &state.pool,
        NewMessage {
            conversation_id: Some(conversation.id),
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

    let chain = ChainFields {
        mention_type: Some(MentionType::Direct),
        ..Default::default()
    };

    let assistant = match agents::respond(
        &state,
        &agent,
        scope,
        Some(user_id),
        &request.text,
        &request.text,
        &request.attachments,
        chain.clone(),
    )
    .await
    {
        Ok(message) => message,
        // Upstream failure becomes a visible assistant error row, never a
        // silent drop.
        Err(e) => agents::persist_error_message(&state, agent.id, scope, chain, &e).await?,
    };

    Ok(Json(SendMessageResponse {
        text: assistant.content.clone(),
        message_id: assistant.id,
        conversation_id: Some(conversation.id),
        channel_id: None,
        content_type: assistant.content_type(),
        mention_type: Some(MentionType::Direct),
    }))
}
