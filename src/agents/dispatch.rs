//! Tool/Document Dispatcher
//!
//! Turns an intent classification plus message shape into a concrete plan:
//! defer to long-form document analysis, or run tools and/or the document
//! tier inline.

use crate::agents::intent::{matches_knowledge_keywords, IntentClassification};
use crate::types::ActionType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchDecision {
    /// Long-form analysis of an uploaded attachment; skips the normal
    /// completion call entirely.
    AnalyzeDocument,
    Inline {
        run_tools: bool,
        search_documents: bool,
    },
}

pub fn decide(
    intent: &IntentClassification,
    has_attachments: bool,
    text: &str,
    tools_enabled: bool,
) -> DispatchDecision {
    if intent.action_type == ActionType::LongRichText && has_attachments {
        return DispatchDecision::AnalyzeDocument;
    }

    let run_tools = intent.action_type.wants_tools() && tools_enabled && !intent.tools.is_empty();
    // Knowledge-seeking phrasing forces the document tier even when the
    // classifier did not request it.
    let search_documents = intent.action_type.wants_documents() || matches_knowledge_keywords(text);

    DispatchDecision::Inline {
        run_tools,
        search_documents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToolKind;

    fn intent(action_type: ActionType, tools: Vec<ToolKind>) -> IntentClassification {
        IntentClassification { action_type, tools }
    }

    #[test]
    fn long_rich_text_with_attachment_defers_to_analysis() {
        let decision = decide(
            &intent(ActionType::LongRichText, vec![]),
            true,
            "summarize this contract",
            false,
        );
        assert_eq!(decision, DispatchDecision::AnalyzeDocument);
    }

    #[test]
    fn long_rich_text_without_attachment_stays_inline() {
        let decision = decide(
            &intent(ActionType::LongRichText, vec![]),
            false,
            "summarize this contract",
            false,
        );
        assert!(matches!(decision, DispatchDecision::Inline { .. }));
    }

    #[test]
    fn knowledge_keywords_force_document_search() {
        let decision = decide(
            &intent(ActionType::None, vec![]),
            false,
            "what does the handbook say about travel?",
            false,
        );
        assert_eq!(
            decision,
            DispatchDecision::Inline {
                run_tools: false,
                search_documents: true,
            }
        );
    }

    #[test]
    fn tools_require_agent_opt_in() {
        let decision = decide(
            &intent(ActionType::Tool, vec![ToolKind::WebResearch]),
            false,
            "research rust adoption",
            false,
        );
        assert_eq!(
            decision,
            DispatchDecision::Inline {
                run_tools: false,
                search_documents: false,
            }
        );

        let decision = decide(
            &intent(ActionType::Tool, vec![ToolKind::WebResearch]),
            false,
            "research rust adoption",
            true,
        );
        assert_eq!(
            decision,
            DispatchDecision::Inline {
                run_tools: true,
                search_documents: false,
            }
        );
    }

    #[test]
    fn both_runs_tools_and_documents() {
        let decision = decide(
            &intent(ActionType::Both, vec![ToolKind::ImageGeneration]),
            false,
            "make a chart of our sales",
            true,
        );
        assert_eq!(
            decision,
            DispatchDecision::Inline {
                run_tools: true,
                search_documents: true,
            }
        );
    }
}
