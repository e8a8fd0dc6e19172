//! Mention Parser
//!
//! Scans message text for `@name` tokens and resolves them against the
//! agents attached to a channel. Tokens that look like email domain
//! fragments are skipped. The email heuristic is exactly that, a heuristic;
//! the TLD list is overridable rather than silently tuned.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Agent, AgentMention};

// A token runs until whitespace, another '@', or end of string.
static MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@([^@\s]+)").expect("valid regex"));

const DEFAULT_TLDS: &[&str] = &[
    "com", "org", "net", "io", "co", "ai", "dev", "app", "edu", "gov",
];

pub struct MentionParser {
    tlds: Vec<String>,
}

impl Default for MentionParser {
    fn default() -> Self {
        Self {
            tlds: DEFAULT_TLDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl MentionParser {
    /// Override the TLD suffixes used by the email-fragment heuristic.
    pub fn with_tlds(tlds: Vec<String>) -> Self {
        Self { tlds }
    }

    /// Resolve mentions in text order, deduplicated by agent id (first
    /// occurrence wins). The first element is the primary agent.
    pub fn parse(&self, text: &str, agents: &[Agent]) -> Vec<AgentMention> {
        let mut mentions = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for capture in MENTION_RE.captures_iter(text) {
            let token = &capture[1];
            let token = token.trim_end_matches(|c: char| c.is_ascii_punctuation());
            if token.is_empty() || self.looks_like_email_domain(token) {
                continue;
            }

            if let Some(agent) = resolve_token(token, agents) {
                if seen.insert(agent.id) {
                    mentions.push(AgentMention {
                        agent_id: agent.id,
                        agent_name: agent.name.clone(),
                    });
                }
            }
        }

        mentions
    }

    fn looks_like_email_domain(&self, token: &str) -> bool {
        let lower = token.to_lowercase();
        self.tlds.iter().any(|tld| {
            lower
                .split('.')
                .skip(1)
                .any(|segment| segment == tld.as_str())
        })
    }
}

/// Match priority: exact nickname, exact name, nickname containment, name
/// containment — all case-insensitive, first matching agent wins.
fn resolve_token<'a>(token: &str, agents: &'a [Agent]) -> Option<&'a Agent> {
    let token = token.to_lowercase();

    let exact_nickname = |a: &&Agent| {
        a.nickname
            .as_deref()
            .map(|n| n.to_lowercase() == token)
            .unwrap_or(false)
    };
    let exact_name = |a: &&Agent| a.name.to_lowercase() == token;
    // Containment goes both ways: "@fin" should hit "finance", and a token
    // with a trailing suffix like "finance-bot" should still hit "finance".
    let nickname_contains = |a: &&Agent| {
        a.nickname
            .as_deref()
            .map(|n| {
                let n = n.to_lowercase();
                n.contains(&token) || token.contains(&n)
            })
            .unwrap_or(false)
    };
    let name_contains = |a: &&Agent| {
        let n = a.name.to_lowercase();
        n.contains(&token) || token.contains(&n)
    };

    agents
        .iter()
        .find(exact_nickname)
        .or_else(|| agents.iter().find(exact_name))
        .or_else(|| agents.iter().find(nickname_contains))
        .or_else(|| agents.iter().find(name_contains))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn agent(name: &str, nickname: Option<&str>) -> Agent {
        Agent {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            name: name.to_string(),
            nickname: nickname.map(|s| s.to_string()),
            persona: String::new(),
            specialty: None,
            role_description: None,
            response_structure: None,
            llm_provider: None,
            llm_model: None,
            tools_enabled: false,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn parses_mentions_in_text_order() {
        let agents = vec![agent("Finance", None), agent("Ops", None)];
        let parser = MentionParser::default();
        let mentions = parser.parse("@Ops please sync with @Finance", &agents);
        assert_eq!(mentions.len(), 2);
        assert_eq!(mentions[0].agent_name, "Ops");
        assert_eq!(mentions[1].agent_name, "Finance");
    }

    #[test]
    fn deduplicates_keeping_first_occurrence() {
        let agents = vec![agent("Finance", None), agent("Ops", None)];
        let parser = MentionParser::default();
        let mentions = parser.parse("@Finance please loop in @Finance and @Ops", &agents);
        assert_eq!(mentions.len(), 2);
        assert_eq!(mentions[0].agent_name, "Finance");
        assert_eq!(mentions[1].agent_name, "Ops");
    }

    #[test]
    fn repeated_runs_are_deterministic() {
        let agents = vec![agent("Finance", Some("fin")), agent("Ops", None)];
        let parser = MentionParser::default();
        let text = "@fin and @Ops then @Finance";
        let first = parser.parse(text, &agents);
        for _ in 0..5 {
            assert_eq!(parser.parse(text, &agents), first);
        }
    }

    #[test]
    fn skips_email_addresses() {
        let agents = vec![agent("Finance", None)];
        let parser = MentionParser::default();
        let mentions = parser.parse("reach me at team@finance.com please", &agents);
        assert!(mentions.is_empty());
    }

    #[test]
    fn custom_tld_list_is_honored() {
        let agents = vec![agent("Finance", None)];
        let parser = MentionParser::with_tlds(vec!["xyz".to_string()]);
        // "finance.com" no longer looks like an email domain under the
        // custom list, so it resolves by containment.
        let mentions = parser.parse("ping @finance.com", &agents);
        assert_eq!(mentions.len(), 1);
    }

    #[test]
    fn nickname_has_priority_over_name_containment() {
        let agents = vec![agent("Finance Review", None), agent("Revenue", Some("fin"))];
        let parser = MentionParser::default();
        let mentions = parser.parse("@fin what do you think?", &agents);
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].agent_name, "Revenue");
    }

    #[test]
    fn trailing_punctuation_does_not_break_resolution() {
        let agents = vec![agent("Ops", None)];
        let parser = MentionParser::default();
        let mentions = parser.parse("thanks @Ops!", &agents);
        assert_eq!(mentions.len(), 1);
    }

    #[test]
    fn unresolvable_tokens_are_ignored() {
        let agents = vec![agent("Ops", None)];
        let parser = MentionParser::default();
        let mentions = parser.parse("@nobody @Ops", &agents);
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].agent_name, "Ops");
    }
}
