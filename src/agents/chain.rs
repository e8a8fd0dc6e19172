//! Agent Chain Resolver
//!
//! Sequences several mentioned agents over one user message. The first agent
//! answers inside the request; the rest run as one tracked continuation job,
//! each seeing the transcript of strictly earlier responses. A failure
//! persists an error row at that index with an empty remaining chain and
//! stops the sequence.

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agents::{persist_error_message, respond, ChainFields, Scope};
use crate::db::DatabaseOperations;
use crate::jobs::{self, JobKind};
use crate::models::{AgentMention, AppState, Message};
use crate::types::{AppResult, MentionType};

/// One agent's slot in a chain: its index and the unprocessed suffix after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStep {
    pub agent_id: Uuid,
    pub agent_name: String,
    pub chain_index: i32,
    pub remaining: Vec<Uuid>,
}

/// Chain bookkeeping is pure: mention order is preserved, indices are
/// strictly increasing, and each step's `remaining` is the suffix of agents
/// not yet processed.
pub fn plan_chain(mentions: &[AgentMention]) -> Vec<ChainStep> {
    mentions
        .iter()
        .enumerate()
        .map(|(i, m)| ChainStep {
            agent_id: m.agent_id,
            agent_name: m.agent_name.clone(),
            chain_index: i as i32,
            remaining: mentions[i + 1..].iter().map(|m| m.agent_id).collect(),
        })
        .collect()
}

/// Input for a chained agent: the original message plus prior responses in
/// chain order, attributed by agent name.
pub fn render_chain_transcript(original: &str, prior: &[(String, String)]) -> String {
    if prior.is_empty() {
        return original.to_string();
    }

    let responses = prior
        .iter()
        .map(|(name, content)| format!("{}: {}", name, content))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "ORIGINAL MESSAGE:\n{original}\n\n\
         PRIOR AGENT RESPONSES:\n{responses}\n\n\
         Add your own perspective. Do not repeat what earlier agents already said."
    )
}

pub struct ChainResolver;

impl ChainResolver {
    /// Process the primary agent inline and hand the rest of the chain to a
    /// continuation job. Returns the primary agent's persisted response.
    pub async fn process(
        state: &AppState,
        channel_id: Uuid,
        user_id: Uuid,
        user_message: &Message,
        mentions: Vec<AgentMention>,
    ) -> AppResult<Option<Message>> {
        let steps = plan_chain(&mentions);
        let Some(primary) = steps.first() else {
            return Ok(None);
        };

        let scope = Scope::Channel(channel_id);
        let mention_type = if steps.len() > 1 {
            MentionType::Chain
        } else {
            MentionType::Mention
        };

        let agent = DatabaseOperations::get_agent(&state.pool, primary.agent_id).await?;
        let chain = ChainFields {
            mention_type: Some(mention_type),
            chain_index: Some(primary.chain_index),
            parent_message_id: Some(user_message.id),
            remaining: primary.remaining.clone(),
        };

        let primary_response = match respond(
            state,
            &agent,
            scope,
            Some(user_id),
            &user_message.content,
            &user_message.content,
            &[],
            chain.clone(),
        )
        .await
        {
            Ok(message) => message,
            Err(e) => {
                warn!(agent = %agent.name, error = %e, "Primary agent failed, truncating chain");
                let truncated = ChainFields {
                    remaining: Vec::new(),
                    ..chain
                };
                // The chain stops here; the continuation job is never submitted.
                return persist_error_message(state, agent.id, scope, truncated, &e)
                    .await
                    .map(Some);
            }
        };

        if steps.len() > 1 {
            let text = user_message.content.clone();
            let parent_id = user_message.id;
            let chain_agents: Vec<Uuid> = steps[1..].iter().map(|s| s.agent_id).collect();

            jobs::submit(
                state.clone(),
                JobKind::ChainContinuation,
                json!({
                    "parent_message_id": parent_id,
                    "channel_id": channel_id,
                    "agent_chain": chain_agents,
                }),
                move |job_state| async move {
                    continue_chain(job_state, channel_id, user_id, parent_id, text, mentions).await
                },
            )
            .await?;
        }

        Ok(Some(primary_response))
    }
}

/// Run chained agents 1..n in order. Each sees all prior responses; a
/// failure persists a truncating error row and fails the job.
async fn continue_chain(
    state: AppState,
    channel_id: Uuid,
    user_id: Uuid,
    parent_message_id: Uuid,
    original_text: String,
    mentions: Vec<AgentMention>,
) -> AppResult<()> {
    let scope = Scope::Channel(channel_id);
    let steps = plan_chain(&mentions);

    for step in steps.iter().skip(1) {
        let prior = DatabaseOperations::list_chain_messages(&state.pool, parent_message_id).await?;
        let transcript_entries: Vec<(String, String)> = prior
            .iter()
            .map(|m| (agent_display_name(&mentions, m), m.content.clone()))
            .collect();
        let input = render_chain_transcript(&original_text, &transcript_entries);

        let chain = ChainFields {
            mention_type: Some(MentionType::Chain),
            chain_index: Some(step.chain_index),
            parent_message_id: Some(parent_message_id),
            remaining: step.remaining.clone(),
        };

        let agent = match DatabaseOperations::get_agent(&state.pool, step.agent_id).await {
            Ok(agent) => agent,
            Err(e) => {
                warn!(agent_id = %step.agent_id, error = %e, "Chained agent missing, truncating");
                let truncated = ChainFields {
                    remaining: Vec::new(),
                    ..chain
                };
                persist_error_message(&state, step.agent_id, scope, truncated, &e).await?;
                return Err(e);
            }
        };

        match respond(
            &state,
            &agent,
            scope,
            Some(user_id),
            &input,
            &original_text,
            &[],
            chain.clone(),
        )
        .await
        {
            Ok(message) => {
                info!(
                    agent = %agent.name,
                    chain_index = step.chain_index,
                    message_id = %message.id,
                    "Chained agent responded"
                );
            }
            Err(e) => {
                warn!(agent = %agent.name, error = %e, "Chained agent failed, truncating chain");
                let truncated = ChainFields {
                    remaining: Vec::new(),
                    ..chain
                };
                persist_error_message(&state, agent.id, scope, truncated, &e).await?;
                return Err(e);
            }
        }
    }

    Ok(())
}

fn agent_display_name(mentions: &[AgentMention], message: &Message) -> String {
    message
        .agent_id
        .and_then(|id| mentions.iter().find(|m| m.agent_id == id))
        .map(|m| m.agent_name.clone())
        .unwrap_or_else(|| "Agent".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(name: &str) -> AgentMention {
        AgentMention {
            agent_id: Uuid::new_v4(),
            agent_name: name.to_string(),
        }
    }

    #[test]
    fn plan_assigns_increasing_indices_and_suffixes() {
        let mentions = vec![mention("A"), mention("B"), mention("C")];
        let steps = plan_chain(&mentions);

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].chain_index, 0);
        assert_eq!(steps[1].chain_index, 1);
        assert_eq!(steps[2].chain_index, 2);

        assert_eq!(
            steps[0].remaining,
            vec![mentions[1].agent_id, mentions[2].agent_id]
        );
        assert_eq!(steps[1].remaining, vec![mentions[2].agent_id]);
        assert!(steps[2].remaining.is_empty());
    }

    #[test]
    fn plan_preserves_mention_order() {
        let mentions = vec![mention("First"), mention("Second")];
        let steps = plan_chain(&mentions);
        assert_eq!(steps[0].agent_id, mentions[0].agent_id);
        assert_eq!(steps[1].agent_id, mentions[1].agent_id);
    }

    #[test]
    fn transcript_without_prior_is_the_original() {
        assert_eq!(render_chain_transcript("hello", &[]), "hello");
    }

    #[test]
    fn transcript_attributes_prior_responses_in_order() {
        let prior = vec![
            ("Finance".to_string(), "Budget looks fine.".to_string()),
            ("Ops".to_string(), "Capacity is tight.".to_string()),
        ];
        let transcript = render_chain_transcript("Can we ship in Q3?", &prior);

        assert!(transcript.contains("ORIGINAL MESSAGE:\nCan we ship in Q3?"));
        let finance_pos = transcript.find("Finance: Budget looks fine.").unwrap();
        let ops_pos = transcript.find("Ops: Capacity is tight.").unwrap();
        assert!(finance_pos < ops_pos);
    }

    #[test]
    fn earlier_steps_never_see_later_agents() {
        // The transcript for step i is built from persisted rows with
        // chain_index < i; the plan itself guarantees the primary sees none.
        let mentions = vec![mention("A"), mention("B"), mention("C")];
        let steps = plan_chain(&mentions);
        // Step 0's input carries no prior entries by construction.
        assert_eq!(render_chain_transcript("msg", &[]), "msg");
        // Step 2's remaining is empty: nothing after it to leak backwards.
        assert!(steps[2].remaining.is_empty());
    }
}
