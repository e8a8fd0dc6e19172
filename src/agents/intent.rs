//! Intent classification
//!
//! One completion call deciding what the pipeline should do with a message:
//! run tools, search documents, defer to long-form analysis, or nothing.
//! Parsing is defensive; an unusable classification degrades to `None`
//! rather than failing the message.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use crate::llm::LLM;
use crate::models::ToolKind;
use crate::types::{ActionType, LLMMessage, LLMRequest};

/// Knowledge-seeking phrasing that forces the document tier even when the
/// classifier does not ask for it. Recall over precision.
static KNOWLEDGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(policy|policies|sop|sops|handbook|guideline|procedure|onboarding|playbook|benefits|compliance)\b")
        .expect("valid regex")
});

pub fn matches_knowledge_keywords(text: &str) -> bool {
    KNOWLEDGE_RE.is_match(text)
}

#[derive(Debug, Clone)]
pub struct IntentClassification {
    pub action_type: ActionType,
    pub tools: Vec<ToolKind>,
}

impl Default for IntentClassification {
    fn default() -> Self {
        Self {
            action_type: ActionType::None,
            tools: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    action_type: String,
    #[serde(default)]
    tools: Vec<String>,
}

pub struct IntentClassifier;

impl IntentClassifier {
    pub async fn classify(llm: &LLM, model: &str, message: &str, has_attachments: bool) -> IntentClassification {
        let prompt = format!(
            r#"Classify what a team-chat assistant should do with this message.

MESSAGE: {message}
HAS_ATTACHMENTS: {has_attachments}

Respond with ONLY a JSON object:
{{"action_type": "tool" | "document_search" | "long_rich_text" | "both" | "none",
  "tools": ["image_generation" | "web_research", ...]}}

Rules:
- "long_rich_text": the user wants an uploaded document analyzed or summarized
- "tool": the message needs an image generated or live web research
- "document_search": the message asks about internal company knowledge
- "both": needs tools and document search
- "none": plain conversation"#,
        );

        let request = LLMRequest {
            provider: llm.provider_name().to_string(),
            model: model.to_string(),
            messages: vec![LLMMessage::user(prompt)],
            max_tokens: Some(128),
            temperature: Some(0.0),
            system_instruction: None,
            tools: None,
        };

        match llm.create_chat_completion(&request).await {
            Ok(response) => {
                let classification = parse_classification(&response.content);
                info!(action_type = ?classification.action_type, "Intent classified");
                classification
            }
            Err(e) => {
                warn!(error = %e, "Intent classification failed, defaulting to none");
                IntentClassification::default()
            }
        }
    }
}

/// Parse the classifier output, tolerating fenced or prefixed JSON. Anything
/// unusable becomes the default classification.
pub fn parse_classification(content: &str) -> IntentClassification {
    let trimmed = content.trim();
    let json_slice = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => return IntentClassification::default(),
    };

    let Ok(raw) = serde_json::from_str::<RawClassification>(json_slice) else {
        return IntentClassification::default();
    };

    let action_type = ActionType::parse(&raw.action_type).unwrap_or(ActionType::None);
    let tools = raw
        .tools
        .iter()
        .filter_map(|t| match t.as_str() {
            "image_generation" => Some(ToolKind::ImageGeneration),
            "web_research" => Some(ToolKind::WebResearch),
            _ => None,
        })
        .collect();

    IntentClassification { action_type, tools }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let c = parse_classification(r#"{"action_type": "tool", "tools": ["web_research"]}"#);
        assert_eq!(c.action_type, ActionType::Tool);
        assert_eq!(c.tools, vec![ToolKind::WebResearch]);
    }

    #[test]
    fn parses_fenced_json() {
        let c = parse_classification(
            "```json\n{\"action_type\": \"document_search\", \"tools\": []}\n```",
        );
        assert_eq!(c.action_type, ActionType::DocumentSearch);
    }

    #[test]
    fn unknown_tools_are_dropped() {
        let c = parse_classification(r#"{"action_type": "both", "tools": ["warp_drive"]}"#);
        assert_eq!(c.action_type, ActionType::Both);
        assert!(c.tools.is_empty());
    }

    #[test]
    fn garbage_degrades_to_none() {
        let c = parse_classification("I think you should search the docs");
        assert_eq!(c.action_type, ActionType::None);
    }

    #[test]
    fn knowledge_keywords_match() {
        assert!(matches_knowledge_keywords("what is our vacation policy?"));
        assert!(matches_knowledge_keywords("where is the SOP for refunds"));
        assert!(matches_knowledge_keywords("check the employee handbook"));
        assert!(!matches_knowledge_keywords("how was your weekend"));
    }
}
