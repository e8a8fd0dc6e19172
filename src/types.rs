// Type definitions and enums

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum LLMProvider {
    OpenAI,
    Anthropic,
    OpenRouter,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMRequest {
    pub provider: String,
    pub model: String,
    pub messages: Vec<LLMMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_instruction: Option<String>,
    pub tools: Option<Vec<ToolDefinition>>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMMessage {
    pub role: String, // "user", "assistant", "system"
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

/// A callable function exposed to the completion service.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A function invocation requested by the completion service.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub finish_reason: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// What kind of content an assistant message carries. Stored as text in the
/// messages table; all dispatch in code goes through this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    ImageGeneration,
    WebResearch,
    DocumentAnalysis,
    Mixed,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::ImageGeneration => "image_generation",
            ContentType::WebResearch => "web_research",
            ContentType::DocumentAnalysis => "document_analysis",
            ContentType::Mixed => "mixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(ContentType::Text),
            "image_generation" => Some(ContentType::ImageGeneration),
            "web_research" => Some(ContentType::WebResearch),
            "document_analysis" => Some(ContentType::DocumentAnalysis),
            "mixed" => Some(ContentType::Mixed),
            _ => None,
        }
    }
}

/// Classifier verdict on what the pipeline should do with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Tool,
    DocumentSearch,
    LongRichText,
    Both,
    None,
}

impl ActionType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tool" => Some(ActionType::Tool),
            "document_search" => Some(ActionType::DocumentSearch),
            "long_rich_text" => Some(ActionType::LongRichText),
            "both" => Some(ActionType::Both),
            "none" => Some(ActionType::None),
            _ => None,
        }
    }

    pub fn wants_tools(&self) -> bool {
        matches!(self, ActionType::Tool | ActionType::Both)
    }

    pub fn wants_documents(&self) -> bool {
        matches!(self, ActionType::DocumentSearch | ActionType::Both)
    }
}

/// How an agent ended up handling a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionType {
    Direct,
    Mention,
    Chain,
}

impl MentionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MentionType::Direct => "direct",
            MentionType::Mention => "mention",
            MentionType::Chain => "chain",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM API error: {0}")]
    LLMApi(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Document parse error: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Integration not connected: {0}")]
    IntegrationNotConnected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::AccessDenied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::IntegrationNotConnected(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = axum::Json(serde_json::json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_round_trips_through_text() {
        for ct in [
            ContentType::Text,
            ContentType::ImageGeneration,
            ContentType::WebResearch,
            ContentType::DocumentAnalysis,
            ContentType::Mixed,
        ] {
            assert_eq!(ContentType::parse(ct.as_str()), Some(ct));
        }
        assert_eq!(ContentType::parse("bogus"), None);
    }

    #[test]
    fn action_type_wants_flags() {
        assert!(ActionType::Both.wants_tools());
        assert!(ActionType::Both.wants_documents());
        assert!(!ActionType::DocumentSearch.wants_tools());
        assert!(!ActionType::None.wants_documents());
    }
}
