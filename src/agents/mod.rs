//! Agent System
//!
//! The per-agent message pipeline and the pieces around it:
//!
//! - **Mention Parser**: resolves `@name` tokens against channel agents
//! - **Intent Classifier**: decides tool / document / analysis handling
//! - **Tool/Document Dispatcher**: turns intent into a concrete plan
//! - **Agent Chain Resolver**: sequences several agents over one message
//!
//! ## Pipeline Overview
//!
//! ```text
//! User Message
//!      │
//!      ▼
//! Mention Parser (channel mode)
//!      │
//!      ▼
//! Chain Resolver ── per agent ──▶ Intent → Dispatch → Context → Prompt
//!      │                                                   │
//!      ▼                                                   ▼
//!  chained jobs                                   Completion service
//!                                                          │
//!                                                          ▼
//!                                              Persisted assistant row
//! ```

pub mod analysis;
pub mod chain;
pub mod dispatch;
pub mod intent;
pub mod mentions;
pub mod tools;

pub use chain::ChainResolver;
pub use mentions::MentionParser;

use tracing::{error, info};
use uuid::Uuid;

use crate::agents::dispatch::DispatchDecision;
use crate::agents::intent::IntentClassifier;
use crate::agents::tools::{
    derive_content_type, render_tool_context, summarize_web_research, ToolRunner,
};
use crate::context::query::QueryExpander;
use crate::context::{normalize_query, ContextRetriever, PromptComposer};
use crate::db::{DatabaseOperations, NewMessage};
use crate::llm::llm_for_agent;
use crate::models::{Agent, AppState, Attachment, Message, ToolKind};
use crate::realtime::MessageEvent;
use crate::types::{AppResult, ContentType, LLMMessage, LLMRequest, MentionType};
use crate::utils::with_timeout;

/// Where a message lives: a private conversation or a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Conversation(Uuid),
    Channel(Uuid),
}

impl Scope {
    pub fn conversation_id(&self) -> Option<Uuid> {
        match self {
            Scope::Conversation(id) => Some(*id),
            Scope::Channel(_) => None,
        }
    }

    pub fn channel_id(&self) -> Option<Uuid> {
        match self {
            Scope::Conversation(_) => None,
            Scope::Channel(id) => Some(*id),
        }
    }
}

/// Chain bookkeeping for a persisted assistant row.
#[derive(Debug, Clone, Default)]
pub struct ChainFields {
    pub mention_type: Option<MentionType>,
    pub chain_index: Option<i32>,
    pub parent_message_id: Option<Uuid>,
    pub remaining: Vec<Uuid>,
}

/// Run one agent against one message and persist the assistant response.
///
/// `input_text` is what the agent responds to (for chained agents it already
/// carries the prior-response transcript); `base_query` is the original user
/// text used for search.
pub async fn respond(
    state: &AppState,
    agent: &Agent,
    scope: Scope,
    user_id: Option<Uuid>,
    input_text: &str,
    base_query: &str,
    attachments: &[Attachment],
    chain: ChainFields,
) -> AppResult<Message> {
    let (llm, model) = llm_for_agent(&state.config, agent)?;
    let normalized = normalize_query(base_query);

    let intent =
        IntentClassifier::classify(&llm, &model, input_text, !attachments.is_empty()).await;

    let decision = dispatch::decide(
        &intent,
        !attachments.is_empty(),
        input_text,
        agent.tools_enabled,
    );

    if let Some(attachment) = attachments.first() {
        if decision == DispatchDecision::AnalyzeDocument {
            return analysis::start_analysis(state, agent, scope, user_id, attachment, &chain)
                .await;
        }
    }

    let (run_tools, search_documents) = match decision {
        DispatchDecision::Inline {
            run_tools,
            search_documents,
        } => (run_tools, search_documents),
        // Unreachable without an attachment; treat as plain conversation.
        DispatchDecision::AnalyzeDocument => (false, false),
    };

    // Tool execution, sequential, partial failures captured per tool.
    let tool_results = if run_tools {
        ToolRunner::new(&state.config, &llm, &model)
            .execute(&intent.tools, &normalized)
            .await
    } else {
        Vec::new()
    };

    // Context assembly. Query expansion only matters for the document tier.
    let doc_queries = if search_documents {
        QueryExpander::expand(&llm, &model, &normalized).await.queries()
    } else {
        Vec::new()
    };

    let company_id = user_company(state, user_id, agent).await;
    let context = ContextRetriever::new(&state.pool, &state.config)
        .retrieve(company_id, agent.id, &doc_queries, &normalized)
        .await;

    info!(
        agent = %agent.name,
        context_used = context.context_used,
        tool_count = tool_results.len(),
        "Assembled agent context"
    );

    let tool_context = render_tool_context(&tool_results);
    let prompt = PromptComposer::compose(agent, &context.sections, &tool_context, input_text);

    let request = LLMRequest {
        provider: llm.provider_name().to_string(),
        model: model.clone(),
        messages: vec![LLMMessage::user(prompt)],
        max_tokens: Some(2048),
        temperature: Some(0.7),
        system_instruction: None,
        tools: None,
    };

    let started = std::time::Instant::now();
    let response = with_timeout(
        "completion",
        state.config.limits.completion_timeout_secs,
        llm.create_chat_completion(&request),
    )
    .await?;

    let content_type = derive_content_type(&tool_results);
    let content = render_visible_content(&response.content, content_type, &tool_results);

    let message = DatabaseOperations::create_message(
        &state.pool,
        NewMessage {
            conversation_id: scope.conversation_id(),
            channel_id: scope.channel_id(),
            agent_id: Some(agent.id),
            role: "assistant".to_string(),
            content,
            content_type,
            tool_results: (!tool_results.is_empty()).then_some(tool_results),
            parent_message_id: chain.parent_message_id,
            chain_index: chain.chain_index,
            agent_chain: chain.chain_index.map(|_| chain.remaining.clone()),
            mention_type: chain.mention_type,
            ..Default::default()
        },
    )
    .await?;

    DatabaseOperations::create_token_usage(
        &state.pool,
        Some(message.id),
        llm.provider_name(),
        &model,
        &response.usage,
        started.elapsed().as_millis() as i64,
    )
    .await?;

    state.events.publish(MessageEvent::inserted(message.clone())).await;

    Ok(message)
}

/// Visible message body by content type. Web research never shows raw JSON;
/// generated images append their URL.
fn render_visible_content(
    completion: &str,
    content_type: ContentType,
    tool_results: &[crate::models::ToolExecution],
) -> String {
    match content_type {
        ContentType::WebResearch => tool_results
            .iter()
            .find(|r| r.success && r.kind == ToolKind::WebResearch)
            .and_then(|r| r.output.as_ref())
            .map(summarize_web_research)
            .unwrap_or_else(|| completion.to_string()),
        ContentType::ImageGeneration => {
            let url = tool_results
                .iter()
                .find(|r| r.success && r.kind == ToolKind::ImageGeneration)
                .and_then(|r| r.output.as_ref())
                .and_then(|o| o.get("url"))
                .and_then(|u| u.as_str());
            match url {
                Some(url) => format!("{}\n\n![generated image]({})", completion.trim(), url),
                None => completion.to_string(),
            }
        }
        _ => completion.to_string(),
    }
}

/// The company scoping context retrieval: the sender's company when known,
/// otherwise the agent's.
async fn user_company(state: &AppState, user_id: Option<Uuid>, agent: &Agent) -> Option<Uuid> {
    if let Some(user_id) = user_id {
        match DatabaseOperations::get_user(&state.pool, user_id).await {
            Ok(Some(user)) if user.company_id.is_some() => return user.company_id,
            Ok(_) => {}
            Err(e) => error!(error = %e, "User lookup failed, falling back to agent company"),
        }
    }
    Some(agent.company_id)
}

/// Persist a user-visible error row. Chain callers pass an empty `remaining`
/// to record explicit truncation.
pub async fn persist_error_message(
    state: &AppState,
    agent_id: Uuid,
    scope: Scope,
    chain: ChainFields,
    error: &crate::types::AppError,
) -> AppResult<Message> {
    let content = user_facing_error(error);

    let message = DatabaseOperations::create_message(
        &state.pool,
        NewMessage {
            conversation_id: scope.conversation_id(),
            channel_id: scope.channel_id(),
            agent_id: Some(agent_id),
            role: "assistant".to_string(),
            content,
            content_type: ContentType::Text,
            content_metadata: Some(crate::models::ContentMetadata {
                error: true,
                can_retry: false,
                ..Default::default()
            }),
            parent_message_id: chain.parent_message_id,
            chain_index: chain.chain_index,
            agent_chain: chain.chain_index.map(|_| chain.remaining.clone()),
            mention_type: chain.mention_type,
            ..Default::default()
        },
    )
    .await?;

    state.events.publish(MessageEvent::inserted(message.clone())).await;
    Ok(message)
}

/// Distinct wording for permission and integration failures; everything else
/// gets the generic upstream-failure message.
fn user_facing_error(error: &crate::types::AppError) -> String {
    use crate::types::AppError;
    match error {
        AppError::AccessDenied(detail) => {
            format!("I can't help here: access denied ({}).", detail)
        }
        AppError::IntegrationNotConnected(name) => format!(
            "The {} integration isn't connected yet. Connect it in settings and try again.",
            name
        ),
        _ => "Something went wrong while generating this response. Please try again.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_accessors_are_exclusive() {
        let c = Scope::Conversation(Uuid::new_v4());
        assert!(c.conversation_id().is_some());
        assert!(c.channel_id().is_none());

        let ch = Scope::Channel(Uuid::new_v4());
        assert!(ch.conversation_id().is_none());
        assert!(ch.channel_id().is_some());
    }

    #[test]
    fn error_wording_distinguishes_access_and_integration() {
        use crate::types::AppError;
        let access = user_facing_error(&AppError::AccessDenied("not a member".to_string()));
        let integration =
            user_facing_error(&AppError::IntegrationNotConnected("Drive".to_string()));
        let generic = user_facing_error(&AppError::LLMApi("500".to_string()));
        assert!(access.contains("access denied"));
        assert!(integration.contains("Drive"));
        assert!(!generic.contains("access denied"));
    }
}
