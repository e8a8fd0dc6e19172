use sqlx::PgPool;
use uuid::Uuid;

use crate::models::*;
use crate::types::{AppError, AppResult, ContentType, MentionType};
use crate::utils::escape_like;

/// Fields for a message insert. The scope is set by exactly one of
/// `conversation_id`/`channel_id`; the schema rejects anything else.
#[derive(Debug)]
pub struct NewMessage {
    pub conversation_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub role: String,
    pub content: String,
    pub content_type: ContentType,
    pub content_metadata: Option<ContentMetadata>,
    pub tool_results: Option<Vec<ToolExecution>>,
    pub attachments: Option<Vec<Attachment>>,
    pub client_message_id: Option<String>,
    pub parent_message_id: Option<Uuid>,
    pub chain_index: Option<i32>,
    pub agent_chain: Option<Vec<Uuid>>,
    pub mention_type: Option<MentionType>,
    pub is_generating: bool,
    pub generation_progress: i32,
}

impl Default for NewMessage {
    fn default() -> Self {
        Self {
            conversation_id: None,
            channel_id: None,
            user_id: None,
            agent_id: None,
            role: "assistant".to_string(),
            content: String::new(),
            content_type: ContentType::Text,
            content_metadata: None,
            tool_results: None,
            attachments: None,
            client_message_id: None,
            parent_message_id: None,
            chain_index: None,
            agent_chain: None,
            mention_type: None,
            is_generating: false,
            generation_progress: 0,
        }
    }
}

pub struct DatabaseOperations;

impl DatabaseOperations {
    // User operations

    pub async fn get_user(pool: &PgPool, user_id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    // Company operations

    pub async fn get_company(pool: &PgPool, company_id: Uuid) -> AppResult<Option<Company>> {
        let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
            .bind(company_id)
            .fetch_optional(pool)
            .await?;

        Ok(company)
    }

    // Agent operations

    pub async fn get_agent(pool: &PgPool, agent_id: Uuid) -> AppResult<Agent> {
        let agent = sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE id = $1")
            .bind(agent_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("agent {}", agent_id)))?;

        Ok(agent)
    }

    /// Agents attached to a channel, in attachment order.
    pub async fn get_channel_agents(pool: &PgPool, channel_id: Uuid) -> AppResult<Vec<Agent>> {
        let agents = sqlx::query_as::<_, Agent>(
            r#"
            SELECT a.* FROM agents a
            JOIN channel_agents ca ON ca.agent_id = a.id
            WHERE ca.channel_id = $1
            ORDER BY a.created_at ASC
            "#,
        )
        .bind(channel_id)
        .fetch_all(pool)
        .await?;

        Ok(agents)
    }

    // Channel operations

    pub async fn get_channel(pool: &PgPool, channel_id: Uuid) -> AppResult<Channel> {
        let channel = sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE id = $1")
            .bind(channel_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("channel {}", channel_id)))?;

        Ok(channel)
    }

    pub async fn is_channel_member(
        pool: &PgPool,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1::bigint FROM channel_members WHERE channel_id = $1 AND user_id = $2",
        )
        .bind(channel_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.is_some())
    }

    // Conversation operations

    /// Atomic get-or-create keyed on (user, agent, company). Concurrent
    /// callers race on the unique index; the loser's upsert lands on the
    /// existing row, so both return the same conversation.
    pub async fn get_or_create_conversation(
        pool: &PgPool,
        user_id: Uuid,
        agent_id: Uuid,
        company_id: Uuid,
    ) -> AppResult<Conversation> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (user_id, agent_id, company_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, agent_id, company_id)
            DO UPDATE SET updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(agent_id)
        .bind(company_id)
        .fetch_one(pool)
        .await?;

        Ok(conversation)
    }

    pub async fn get_conversation(
        pool: &PgPool,
        conversation_id: Uuid,
    ) -> AppResult<Option<Conversation>> {
        let conv = sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
            .bind(conversation_id)
            .fetch_optional(pool)
            .await?;

        Ok(conv)
    }

    // Message operations

    pub async fn create_message(pool: &PgPool, message: NewMessage) -> AppResult<Message> {
        let new_message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (
                conversation_id, channel_id, user_id, agent_id, role, content,
                content_type, content_metadata, tool_results, attachments,
                client_message_id, parent_message_id, chain_index, agent_chain,
                mention_type, is_generating, generation_progress
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(message.conversation_id)
        .bind(message.channel_id)
        .bind(message.user_id)
        .bind(message.agent_id)
        .bind(&message.role)
        .bind(&message.content)
        .bind(message.content_type.as_str())
        .bind(message.content_metadata.map(sqlx::types::Json))
        .bind(message.tool_results.map(sqlx::types::Json))
        .bind(message.attachments.map(sqlx::types::Json))
        .bind(&message.client_message_id)
        .bind(message.parent_message_id)
        .bind(message.chain_index)
        .bind(message.agent_chain.map(sqlx::types::Json))
        .bind(message.mention_type.map(|m| m.as_str()))
        .bind(message.is_generating)
        .bind(message.generation_progress)
        .fetch_one(pool)
        .await?;

        Ok(new_message)
    }

    pub async fn get_message(pool: &PgPool, message_id: Uuid) -> AppResult<Message> {
        let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
            .bind(message_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("message {}", message_id)))?;

        Ok(message)
    }

    pub async fn list_conversation_messages(
        pool: &PgPool,
        conversation_id: Uuid,
        after: Option<chrono::DateTime<chrono::Utc>>,
    ) -> AppResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = $1
              AND ($2::timestamptz IS NULL OR created_at > $2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(conversation_id)
        .bind(after)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    pub async fn list_channel_messages(
        pool: &PgPool,
        channel_id: Uuid,
        after: Option<chrono::DateTime<chrono::Utc>>,
    ) -> AppResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE channel_id = $1
              AND ($2::timestamptz IS NULL OR created_at > $2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(channel_id)
        .bind(after)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    /// Chained responses already persisted for an originating user message,
    /// oldest first.
    pub async fn list_chain_messages(
        pool: &PgPool,
        parent_message_id: Uuid,
    ) -> AppResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE parent_message_id = $1 AND chain_index IS NOT NULL
            ORDER BY chain_index ASC
            "#,
        )
        .bind(parent_message_id)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    /// Replace the generation placeholder content once analysis resolves.
    pub async fn finalize_message(
        pool: &PgPool,
        message_id: Uuid,
        content: &str,
        content_type: ContentType,
        content_metadata: Option<&ContentMetadata>,
    ) -> AppResult<Message> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            UPDATE messages
            SET content = $2,
                content_type = $3,
                content_metadata = $4,
                is_generating = FALSE,
                generation_progress = 100
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(message_id)
        .bind(content)
        .bind(content_type.as_str())
        .bind(content_metadata.map(sqlx::types::Json))
        .fetch_one(pool)
        .await?;

        Ok(message)
    }

    pub async fn update_generation_progress(
        pool: &PgPool,
        message_id: Uuid,
        progress: i32,
    ) -> AppResult<Message> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            UPDATE messages
            SET generation_progress = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(message_id)
        .bind(progress)
        .fetch_one(pool)
        .await?;

        Ok(message)
    }

    // Document operations

    /// Ranked similarity search via the match_documents RPC. The embedding is
    /// passed as a pgvector literal.
    pub async fn match_documents(
        pool: &PgPool,
        embedding: &[f32],
        similarity_threshold: f64,
        match_count: i32,
        company_id: Uuid,
        agent_id: Option<Uuid>,
    ) -> AppResult<Vec<DocumentMatch>> {
        let literal = format!(
            "[{}]",
            embedding
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",")
        );

        let matches = sqlx::query_as::<_, DocumentMatch>(
            "SELECT * FROM match_documents($1::vector, $2, $3, $4, $5)",
        )
        .bind(literal)
        .bind(similarity_threshold)
        .bind(match_count)
        .bind(company_id)
        .bind(agent_id)
        .fetch_all(pool)
        .await?;

        Ok(matches)
    }

    // Playbook operations

    /// Case-insensitive substring match over title/description/markdown,
    /// most recently updated first.
    pub async fn search_playbook_entries(
        pool: &PgPool,
        company_id: Uuid,
        query: &str,
        limit: i64,
    ) -> AppResult<Vec<PlaybookEntry>> {
        let pattern = format!("%{}%", escape_like(query));

        let entries = sqlx::query_as::<_, PlaybookEntry>(
            r#"
            SELECT * FROM playbook_entries
            WHERE company_id = $1
              AND (title ILIKE $2 OR description ILIKE $2 OR markdown ILIKE $2)
            ORDER BY updated_at DESC
            LIMIT $3
            "#,
        )
        .bind(company_id)
        .bind(pattern)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(entries)
    }

    // Token usage tracking

    pub async fn create_token_usage(
        _pool: &PgPool,
        message_id: Option<Uuid>,
        provider: &str,
        model: &str,
        usage: &crate::types::TokenUsage,
        duration_ms: i64,
    ) -> AppResult<()> {
        tracing::info!(
            message_id = ?message_id,
            provider,
            model,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            duration_ms,
            "Token usage logged"
        );
        Ok(())
    }
}
