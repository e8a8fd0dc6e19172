//! Prompt Composer
//!
//! Merges agent persona, the assembled context block, tool output, and the
//! user query into the final instruction string. Pure and deterministic; no
//! network calls.

use crate::models::Agent;

const DEFAULT_RESPONSE_STRUCTURE: &str =
    "Answer directly and concisely. Use short paragraphs and bullet points where they help.";

pub struct PromptComposer;

impl PromptComposer {
    pub fn compose(agent: &Agent, context: &str, tool_context: &str, user_query: &str) -> String {
        let mut prompt = String::new();

        prompt.push_str(&agent.persona);
        prompt.push('\n');

        if let Some(specialty) = agent.specialty.as_deref().filter(|s| !s.is_empty()) {
            prompt.push_str(&format!("\nSpecialty: {}\n", specialty));
        }

        if let Some(role) = agent.role_description.as_deref().filter(|s| !s.is_empty()) {
            prompt.push_str(&format!("\n{}\n", role));
        }

        if !context.trim().is_empty() {
            prompt.push_str(&format!(
                "\nCOMPANY KNOWLEDGE:\n{}\n",
                context.trim()
            ));
        }

        if !tool_context.trim().is_empty() {
            prompt.push_str(&format!("\nTOOL OUTPUT:\n{}\n", tool_context.trim()));
        }

        let structure = agent
            .response_structure
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_RESPONSE_STRUCTURE);

        prompt.push_str(&format!(
            "\nTASK:\nRespond to the following message from a teammate.\n\n\
             MESSAGE: {}\n\n\
             RESPONSE STRUCTURE:\n{}",
            user_query, structure
        ));

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn agent() -> Agent {
        Agent {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            name: "Finance".to_string(),
            nickname: Some("fin".to_string()),
            persona: "You are the finance agent.".to_string(),
            specialty: Some("budgeting".to_string()),
            role_description: None,
            response_structure: None,
            llm_provider: None,
            llm_model: None,
            tools_enabled: false,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn compose_is_deterministic() {
        let a = agent();
        let p1 = PromptComposer::compose(&a, "ctx", "tools", "What is our runway?");
        let p2 = PromptComposer::compose(&a, "ctx", "tools", "What is our runway?");
        assert_eq!(p1, p2);
    }

    #[test]
    fn compose_skips_empty_blocks() {
        let a = agent();
        let prompt = PromptComposer::compose(&a, "", "  ", "hello");
        assert!(!prompt.contains("COMPANY KNOWLEDGE"));
        assert!(!prompt.contains("TOOL OUTPUT"));
        assert!(prompt.contains("MESSAGE: hello"));
        assert!(prompt.contains(DEFAULT_RESPONSE_STRUCTURE));
    }

    #[test]
    fn compose_includes_context_and_custom_structure() {
        let mut a = agent();
        a.response_structure = Some("Always answer in one sentence.".to_string());
        let prompt = PromptComposer::compose(&a, "## Company Profile\nstuff", "tool says hi", "q");
        assert!(prompt.contains("COMPANY KNOWLEDGE:\n## Company Profile"));
        assert!(prompt.contains("TOOL OUTPUT:\ntool says hi"));
        assert!(prompt.contains("Always answer in one sentence."));
        assert!(!prompt.contains(DEFAULT_RESPONSE_STRUCTURE));
    }
}
