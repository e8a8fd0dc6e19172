use sqlx::PgPool;
use crate::config::Config;
use crate::realtime::EventBus;
use crate::types::{ContentType, MentionType};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub events: EventBus,
}

// Core models
// Note: FromRow is needed for runtime query_as (without DATABASE_URL at compile time)

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: uuid::Uuid,
    pub username: String,
    pub email: String,
    pub company_id: Option<uuid::Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct Company {
    pub id: uuid::Uuid,
    pub name: String,
    pub mission: Option<String>,
    pub vision: Option<String>,
    pub core_values: Option<String>,
    pub positioning: Option<String>,
    pub pain_points: Option<String>,
    pub value_propositions: Option<String>,
    pub drive_folder_id: Option<String>,
    pub drive_access_token: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct Agent {
    pub id: uuid::Uuid,
    pub company_id: uuid::Uuid,
    pub name: String,
    pub nickname: Option<String>,
    pub persona: String,
    pub specialty: Option<String>,
    pub role_description: Option<String>,
    pub response_structure: Option<String>,
    pub llm_provider: Option<String>,
    pub llm_model: Option<String>,
    pub tools_enabled: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct Channel {
    pub id: uuid::Uuid,
    pub company_id: uuid::Uuid,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub agent_id: uuid::Uuid,
    pub company_id: uuid::Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A persisted message row. Belongs to exactly one of {conversation, channel};
/// the schema enforces the exclusivity.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: uuid::Uuid,
    pub conversation_id: Option<uuid::Uuid>,
    pub channel_id: Option<uuid::Uuid>,
    pub user_id: Option<uuid::Uuid>,
    pub agent_id: Option<uuid::Uuid>,
    pub role: String, // "user" or "assistant"
    pub content: String,
    pub content_type: String,
    pub content_metadata: Option<sqlx::types::Json<ContentMetadata>>,
    pub tool_results: Option<sqlx::types::Json<Vec<ToolExecution>>>,
    pub attachments: Option<sqlx::types::Json<Vec<Attachment>>>,
    pub client_message_id: Option<String>,
    pub parent_message_id: Option<uuid::Uuid>,
    pub chain_index: Option<i32>,
    pub agent_chain: Option<sqlx::types::Json<Vec<uuid::Uuid>>>,
    pub mention_type: Option<String>,
    pub is_generating: bool,
    pub generation_progress: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Message {
    pub fn content_type(&self) -> ContentType {
        ContentType::parse(&self.content_type).unwrap_or(ContentType::Text)
    }

    pub fn has_error(&self) -> bool {
        self.content_metadata
            .as_ref()
            .map(|m| m.error)
            .unwrap_or(false)
    }
}

/// Error/retry metadata carried on terminal analysis messages. The attachment
/// fields are everything a retry needs to start a new analysis attempt.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ContentMetadata {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub can_retry: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_type: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Attachment {
    pub path: String,
    pub file_name: String,
    pub file_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    ImageGeneration,
    WebResearch,
}

/// Outcome of one tool invocation. Failures are captured per tool rather than
/// aborting the batch; partial success is a normal result.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolExecution {
    pub tool_id: String,
    pub kind: ToolKind,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct PlaybookEntry {
    pub id: uuid::Uuid,
    pub company_id: uuid::Uuid,
    pub title: String,
    pub section: Option<String>,
    pub status: Option<String>,
    pub tags: Option<Vec<String>>,
    pub description: Option<String>,
    pub markdown: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A document hit from the match_documents similarity RPC.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct DocumentMatch {
    pub id: uuid::Uuid,
    pub title: String,
    pub content: String,
    pub similarity: f64,
}

/// A resolved @-mention, ordered by first occurrence in the message text.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AgentMention {
    pub agent_id: uuid::Uuid,
    pub agent_name: String,
}

// API Request/Response types

#[derive(Debug, serde::Deserialize, validator::Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 32768))]
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub conversation_id: Option<uuid::Uuid>,
    pub channel_id: Option<uuid::Uuid>,
    /// Required when starting a new conversation (no `conversation_id`).
    pub agent_id: Option<uuid::Uuid>,
    #[validate(length(max = 128))]
    pub client_message_id: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct SendMessageResponse {
    /// The assistant reply, or a short acknowledgment on the
    /// document-analysis path.
    pub text: String,
    pub message_id: uuid::Uuid,
    pub conversation_id: Option<uuid::Uuid>,
    pub channel_id: Option<uuid::Uuid>,
    pub content_type: ContentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mention_type: Option<MentionType>,
}

#[derive(Debug, serde::Deserialize)]
pub struct ListMessagesQuery {
    pub conversation_id: Option<uuid::Uuid>,
    pub channel_id: Option<uuid::Uuid>,
    pub after: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
    pub redis: Option<String>,
}
