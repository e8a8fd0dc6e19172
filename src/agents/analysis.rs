//! Long-document analysis
//!
//! The long-rich-text path skips the normal completion call. The attachment
//! is fetched and parsed up front; a placeholder assistant row goes out
//! immediately with `is_generating` set, and the analysis itself runs as a
//! tracked background job keyed by that row. Fetch/parse failures persist a
//! terminal, retryable error row instead — a placeholder must never be left
//! stuck with no way to resolve it.

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agents::{ChainFields, Scope};
use crate::db::{DatabaseOperations, NewMessage};
use crate::docparse::DocumentParser;
use crate::jobs::{self, JobKind};
use crate::llm::llm_for_agent;
use crate::models::{Agent, AppState, Attachment, ContentMetadata, Message};
use crate::realtime::MessageEvent;
use crate::storage::S3Client;
use crate::types::{AppError, AppResult, ContentType, LLMMessage, LLMRequest};
use crate::utils::{truncate_with_ellipsis, with_timeout};

const PLACEHOLDER_PROGRESS: i32 = 5;
const PARSING_DONE_PROGRESS: i32 = 40;
const COMPLETION_SENT_PROGRESS: i32 = 80;
const MAX_ANALYSIS_CHARS: usize = 24_000;

/// Error/retry metadata carrying everything a retry needs.
pub fn error_metadata(attachment: &Attachment) -> ContentMetadata {
    ContentMetadata {
        error: true,
        can_retry: true,
        attachment_path: Some(attachment.path.clone()),
        attachment_name: Some(attachment.file_name.clone()),
        attachment_type: Some(attachment.file_type.clone()),
    }
}

/// Rebuild the attachment from persisted retry metadata.
pub fn attachment_from_metadata(metadata: &ContentMetadata) -> Option<Attachment> {
    Some(Attachment {
        path: metadata.attachment_path.clone()?,
        file_name: metadata.attachment_name.clone()?,
        file_type: metadata.attachment_type.clone()?,
        size: None,
    })
}

fn analysis_prompt(agent: &Agent, file_name: &str, extracted_text: &str) -> String {
    format!(
        r#"{persona}

A teammate uploaded the document "{file_name}" and asked for an analysis.

DOCUMENT CONTENT:
{content}

TASK:
Produce a thorough analysis of this document:
1. A short overview of what it is
2. The key points, grouped by theme
3. Anything unusual, risky, or worth a follow-up
4. A concise summary a teammate could read in under a minute"#,
        persona = agent.persona,
        file_name = file_name,
        content = truncate_with_ellipsis(extracted_text, MAX_ANALYSIS_CHARS),
    )
}

/// Fetch and parse the attachment, persist the visible placeholder, and kick
/// off the analysis job. Returns the placeholder row (whose content doubles
/// as the synchronous acknowledgment), or the terminal error row on
/// fetch/parse failure.
pub async fn start_analysis(
    state: &AppState,
    agent: &Agent,
    scope: Scope,
    _user_id: Option<Uuid>,
    attachment: &Attachment,
    chain: &ChainFields,
) -> AppResult<Message> {
    let parse_timeout = state.config.limits.parse_timeout_secs;

    let extracted = match fetch_and_extract(state, attachment, parse_timeout).await {
        Ok(text) => text,
        Err(e) => {
            warn!(file = %attachment.file_name, error = %e, "Attachment ingest failed");
            return persist_terminal_error(state, agent, scope, attachment, chain, &e).await;
        }
    };

    let placeholder = DatabaseOperations::create_message(
        &state.pool,
        NewMessage {
            conversation_id: scope.conversation_id(),
            channel_id: scope.channel_id(),
            agent_id: Some(agent.id),
            role: "assistant".to_string(),
            content: format!(
                "Analyzing {} — the full analysis will appear here shortly.",
                attachment.file_name
            ),
            content_type: ContentType::DocumentAnalysis,
            parent_message_id: chain.parent_message_id,
            chain_index: chain.chain_index,
            mention_type: chain.mention_type,
            is_generating: true,
            generation_progress: PLACEHOLDER_PROGRESS,
            ..Default::default()
        },
    )
    .await?;

    state
        .events
        .publish(MessageEvent::inserted(placeholder.clone()))
        .await;

    let message_id = placeholder.id;
    let job_agent = agent.clone();
    let job_attachment = attachment.clone();

    jobs::submit(
        state.clone(),
        JobKind::DocumentAnalysis,
        json!({
            "message_id": message_id,
            "file_name": attachment.file_name,
            "extracted_chars": extracted.len(),
        }),
        move |job_state| async move {
            run_analysis(job_state, message_id, job_agent, job_attachment, extracted).await
        },
    )
    .await?;

    Ok(placeholder)
}

/// Retry a failed analysis from the fields persisted in its error metadata.
pub async fn retry_analysis(state: &AppState, message: &Message) -> AppResult<Message> {
    let metadata = message
        .content_metadata
        .as_ref()
        .filter(|m| m.error && m.can_retry)
        .ok_or_else(|| AppError::InvalidRequest("Message is not retryable".to_string()))?;

    let attachment = attachment_from_metadata(metadata).ok_or_else(|| {
        AppError::InvalidRequest("Retry metadata is missing attachment fields".to_string())
    })?;

    let agent_id = message
        .agent_id
        .ok_or_else(|| AppError::InvalidRequest("Message has no agent".to_string()))?;
    let agent = DatabaseOperations::get_agent(&state.pool, agent_id).await?;

    let scope = match (message.conversation_id, message.channel_id) {
        (Some(id), None) => Scope::Conversation(id),
        (None, Some(id)) => Scope::Channel(id),
        _ => return Err(AppError::Internal("Message has no scope".to_string())),
    };

    info!(message_id = %message.id, file = %attachment.file_name, "Retrying document analysis");
    start_analysis(state, &agent, scope, None, &attachment, &ChainFields::default()).await
}

async fn fetch_and_extract(
    state: &AppState,
    attachment: &Attachment,
    timeout_secs: u64,
) -> AppResult<String> {
    let storage = S3Client::new(&state.config.storage)?;
    let bytes = with_timeout(
        "attachment download",
        timeout_secs,
        storage.download(&attachment.path),
    )
    .await?;

    let parser = DocumentParser::from_config(&state.config);
    let result = with_timeout(
        "document parse",
        timeout_secs,
        parser.parse(
            bytes,
            &attachment.path,
            &attachment.file_name,
            &attachment.file_type,
        ),
    )
    .await?;

    if !result.success {
        return Err(AppError::Parse(
            result
                .error
                .unwrap_or_else(|| "Extraction failed".to_string()),
        ));
    }

    result
        .extracted_text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Parse("Document contained no extractable text".to_string()))
}

async fn persist_terminal_error(
    state: &AppState,
    agent: &Agent,
    scope: Scope,
    attachment: &Attachment,
    chain: &ChainFields,
    error: &AppError,
) -> AppResult<Message> {
    let message = DatabaseOperations::create_message(
        &state.pool,
        NewMessage {
            conversation_id: scope.conversation_id(),
            channel_id: scope.channel_id(),
            agent_id: Some(agent.id),
            role: "assistant".to_string(),
            content: format!(
                "I couldn't read {}: {}. You can retry the analysis.",
                attachment.file_name, error
            ),
            content_type: ContentType::DocumentAnalysis,
            content_metadata: Some(error_metadata(attachment)),
            parent_message_id: chain.parent_message_id,
            chain_index: chain.chain_index,
            mention_type: chain.mention_type,
            ..Default::default()
        },
    )
    .await?;

    state
        .events
        .publish(MessageEvent::inserted(message.clone()))
        .await;

    Ok(message)
}

/// The background half: long-form completion over the extracted text with
/// progress ticks, finalizing the placeholder either way.
async fn run_analysis(
    state: AppState,
    message_id: Uuid,
    agent: Agent,
    attachment: Attachment,
    extracted_text: String,
) -> AppResult<()> {
    publish_progress(&state, message_id, PARSING_DONE_PROGRESS).await;

    let (llm, model) = llm_for_agent(&state.config, &agent)?;
    let prompt = analysis_prompt(&agent, &attachment.file_name, &extracted_text);

    let request = LLMRequest {
        provider: llm.provider_name().to_string(),
        model,
        messages: vec![LLMMessage::user(prompt)],
        max_tokens: Some(4096),
        temperature: Some(0.4),
        system_instruction: None,
        tools: None,
    };

    publish_progress(&state, message_id, COMPLETION_SENT_PROGRESS).await;

    let completion = with_timeout(
        "analysis completion",
        state.config.limits.completion_timeout_secs,
        llm.create_chat_completion(&request),
    )
    .await;

    match completion {
        Ok(response) => {
            let message = DatabaseOperations::finalize_message(
                &state.pool,
                message_id,
                &response.content,
                ContentType::DocumentAnalysis,
                None,
            )
            .await?;
            state.events.publish(MessageEvent::updated(message)).await;
            info!(message_id = %message_id, "Document analysis complete");
            Ok(())
        }
        Err(e) => {
            // Resolve the placeholder into a retryable error row rather than
            // leaving it generating forever.
            let message = DatabaseOperations::finalize_message(
                &state.pool,
                message_id,
                &format!(
                    "The analysis of {} failed: {}. You can retry it.",
                    attachment.file_name, e
                ),
                ContentType::DocumentAnalysis,
                Some(&error_metadata(&attachment)),
            )
            .await?;
            state.events.publish(MessageEvent::updated(message)).await;
            Err(e)
        }
    }
}

async fn publish_progress(state: &AppState, message_id: Uuid, progress: i32) {
    match DatabaseOperations::update_generation_progress(&state.pool, message_id, progress).await {
        Ok(message) => state.events.publish(MessageEvent::updated(message)).await,
        Err(e) => warn!(message_id = %message_id, error = %e, "Progress update failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment() -> Attachment {
        Attachment {
            path: "uploads/contract.pdf".to_string(),
            file_name: "contract.pdf".to_string(),
            file_type: "application/pdf".to_string(),
            size: Some(12345),
        }
    }

    #[test]
    fn retry_metadata_round_trips() {
        let original = attachment();
        let metadata = error_metadata(&original);
        assert!(metadata.error && metadata.can_retry);

        let rebuilt = attachment_from_metadata(&metadata).unwrap();
        assert_eq!(rebuilt.path, original.path);
        assert_eq!(rebuilt.file_name, original.file_name);
        assert_eq!(rebuilt.file_type, original.file_type);
    }

    #[test]
    fn incomplete_metadata_does_not_rebuild() {
        let metadata = ContentMetadata {
            error: true,
            can_retry: true,
            attachment_path: Some("uploads/a.pdf".to_string()),
            attachment_name: None,
            attachment_type: None,
        };
        assert!(attachment_from_metadata(&metadata).is_none());
    }

    #[test]
    fn analysis_prompt_bounds_document_size() {
        let agent = Agent {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            name: "Legal".to_string(),
            nickname: None,
            persona: "You are the legal agent.".to_string(),
            specialty: None,
            role_description: None,
            response_structure: None,
            llm_provider: None,
            llm_model: None,
            tools_enabled: false,
            created_at: chrono::Utc::now(),
        };

        let huge = "x".repeat(MAX_ANALYSIS_CHARS * 2);
        let prompt = analysis_prompt(&agent, "contract.pdf", &huge);
        assert!(prompt.len() < MAX_ANALYSIS_CHARS + 1024);
        assert!(prompt.contains("contract.pdf"));
    }
}
