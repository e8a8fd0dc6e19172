//! Query normalization and expansion
//!
//! Normalization is a pure cleanup pass. Expansion asks the completion
//! service for up to three paraphrases to widen vector recall; it degrades to
//! the original query on any failure and never errors to the caller.

use tracing::{info, warn};

use crate::llm::LLM;
use crate::types::{LLMMessage, LLMRequest};

pub const MAX_EXPANSIONS: usize = 3;

/// Collapse whitespace runs and trim. Idempotent.
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone)]
pub struct ExpandedQuery {
    pub original: String,
    pub expansions: Vec<String>,
}

impl ExpandedQuery {
    /// The search queries in priority order: the original first, then the
    /// paraphrases, deduplicated case-insensitively and capped.
    pub fn queries(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut queries = Vec::new();

        for q in std::iter::once(&self.original).chain(self.expansions.iter()) {
            let key = q.to_lowercase();
            if !q.is_empty() && seen.insert(key) {
                queries.push(q.clone());
            }
            if queries.len() >= MAX_EXPANSIONS {
                break;
            }
        }

        queries
    }
}

pub struct QueryExpander;

impl QueryExpander {
    /// Ask the completion service for paraphrases. Failure here degrades
    /// search recall, not correctness, so every error path returns the
    /// original query alone.
    pub async fn expand(llm: &LLM, model: &str, query: &str) -> ExpandedQuery {
        let original = normalize_query(query);
        if original.is_empty() {
            return ExpandedQuery {
                original,
                expansions: Vec::new(),
            };
        }

        let prompt = format!(
            "Rephrase the following search query {max} different ways to improve \
             document retrieval. Return ONLY a JSON array of {max} strings.\n\n\
             Query: {query}",
            max = MAX_EXPANSIONS,
            query = original,
        );

        let request = LLMRequest {
            provider: llm.provider_name().to_string(),
            model: model.to_string(),
            messages: vec![LLMMessage::user(prompt)],
            max_tokens: Some(256),
            temperature: Some(0.3),
            system_instruction: None,
            tools: None,
        };

        match llm.create_chat_completion(&request).await {
            Ok(response) => {
                let expansions = parse_expansions(&response.content);
                info!(count = expansions.len(), "Query expansion complete");
                ExpandedQuery {
                    original,
                    expansions,
                }
            }
            Err(e) => {
                warn!(error = %e, "Query expansion failed, using original query only");
                ExpandedQuery {
                    original,
                    expansions: Vec::new(),
                }
            }
        }
    }
}

/// Parse the expansion response defensively: a JSON array of strings first,
/// then a newline/comma split of the raw text.
pub fn parse_expansions(content: &str) -> Vec<String> {
    let trimmed = content.trim();

    if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(trimmed) {
        return items
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .take(MAX_EXPANSIONS)
            .collect();
    }

    trimmed
        .split(['\n', ','])
        .map(|s| s.trim().trim_matches('"').trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .take(MAX_EXPANSIONS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_query("  hello\t\n  world  "), "hello world");
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = ["  a   b  ", "a b", "", "\n\t", "  x "];
        for input in inputs {
            let once = normalize_query(input);
            assert_eq!(normalize_query(&once), once);
        }
    }

    #[test]
    fn parse_expansions_accepts_json_array() {
        let parsed = parse_expansions(r#"["vacation policy", "time off rules", "PTO"]"#);
        assert_eq!(parsed, vec!["vacation policy", "time off rules", "PTO"]);
    }

    #[test]
    fn parse_expansions_falls_back_to_lines() {
        let parsed = parse_expansions("vacation policy\ntime off rules\nPTO\nextra one");
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0], "vacation policy");
    }

    #[test]
    fn parse_expansions_falls_back_to_commas() {
        let parsed = parse_expansions("one, two,  , three");
        assert_eq!(parsed, vec!["one", "two", "three"]);
    }

    #[test]
    fn queries_dedupe_and_cap() {
        let expanded = ExpandedQuery {
            original: "Vacation Policy".to_string(),
            expansions: vec![
                "vacation policy".to_string(),
                "time off".to_string(),
                "PTO rules".to_string(),
            ],
        };
        let queries = expanded.queries();
        assert_eq!(queries.len(), MAX_EXPANSIONS);
        assert_eq!(queries[0], "Vacation Policy");
        assert_eq!(queries[1], "time off");
    }
}
