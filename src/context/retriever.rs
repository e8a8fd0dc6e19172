//! Context Retriever
//!
//! Pulls four independent knowledge tiers and assembles them into one
//! bounded context block:
//!
//! 1. Company profile (structured digest, fail-closed)
//! 2. Internal documents (vector similarity search)
//! 3. External Drive files (only when a folder is linked)
//! 4. Playbook entries (keyword match)
//!
//! Tiers degrade independently: a failing tier logs and contributes nothing,
//! the rest still assemble. Tier order is structural, not relevance-ranked,
//! which keeps the final prompt deterministic and auditable.

use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::config::Config;
use crate::db::DatabaseOperations;
use crate::drive::DriveClient;
use crate::embeddings::{EmbeddingClient, SearchLimits, SearchScope, VectorSearch};
use crate::models::Company;
use crate::types::AppResult;
use crate::utils::{truncate_with_ellipsis, with_timeout};

pub const COMPANY_HEADER: &str = "## Company Profile";
pub const DOCUMENTS_HEADER: &str = "## Internal Documents";
pub const DRIVE_HEADER: &str = "## Linked Drive Files";
pub const PLAYBOOK_HEADER: &str = "## Playbook";

#[derive(Debug, Clone, Default)]
pub struct RetrievedContext {
    pub sections: String,
    pub context_used: bool,
}

/// One tier's contribution: a fixed header and an optional body. Failed or
/// empty tiers carry `None`.
#[derive(Debug, Clone)]
pub struct TierSection {
    pub header: &'static str,
    pub body: Option<String>,
}

/// Join the non-empty tiers under their headers, preserving tier order.
pub fn assemble_context(tiers: Vec<TierSection>) -> RetrievedContext {
    let rendered: Vec<String> = tiers
        .into_iter()
        .filter_map(|t| {
            t.body
                .filter(|b| !b.trim().is_empty())
                .map(|b| format!("{}\n\n{}", t.header, b.trim()))
        })
        .collect();

    RetrievedContext {
        context_used: !rendered.is_empty(),
        sections: rendered.join("\n\n"),
    }
}

/// Fixed-shape company digest. Renders only when every sub-section is
/// present; partial records render nothing.
pub fn render_company_digest(company: &Company) -> Option<String> {
    let mission = non_empty(company.mission.as_deref())?;
    let vision = non_empty(company.vision.as_deref())?;
    let values = non_empty(company.core_values.as_deref())?;
    let positioning = non_empty(company.positioning.as_deref())?;
    let pain_points = non_empty(company.pain_points.as_deref())?;
    let value_props = non_empty(company.value_propositions.as_deref())?;

    Some(format!(
        "Mission: {mission}\n\
         Vision: {vision}\n\
         Values: {values}\n\
         Positioning: {positioning}\n\
         Customer Pain Points: {pain_points}\n\
         Value Propositions: {value_props}"
    ))
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

pub struct ContextRetriever<'a> {
    pool: &'a PgPool,
    config: &'a Config,
}

impl<'a> ContextRetriever<'a> {
    pub fn new(pool: &'a PgPool, config: &'a Config) -> Self {
        Self { pool, config }
    }

    /// Retrieve and assemble all tiers for a company. A missing company id
    /// short-circuits to an empty result.
    pub async fn retrieve(
        &self,
        company_id: Option<Uuid>,
        agent_id: Uuid,
        queries: &[String],
        base_query: &str,
    ) -> RetrievedContext {
        let Some(company_id) = company_id else {
            return RetrievedContext::default();
        };

        let profile = self
            .run_tier("company_profile", self.company_profile_tier(company_id))
            .await;
        let documents = self
            .run_tier("documents", self.document_tier(company_id, agent_id, queries))
            .await;
        let drive = self
            .run_tier("drive", self.drive_tier(company_id, base_query))
            .await;
        let playbook = self
            .run_tier("playbook", self.playbook_tier(company_id, base_query))
            .await;

        assemble_context(vec![
            TierSection {
                header: COMPANY_HEADER,
                body: profile,
            },
            TierSection {
                header: DOCUMENTS_HEADER,
                body: documents,
            },
            TierSection {
                header: DRIVE_HEADER,
                body: drive,
            },
            TierSection {
                header: PLAYBOOK_HEADER,
                body: playbook,
            },
        ])
    }

    async fn run_tier(
        &self,
        tier: &'static str,
        fut: impl std::future::Future<Output = AppResult<Option<String>>>,
    ) -> Option<String> {
        match fut.await {
            Ok(body) => body,
            Err(e) => {
                warn!(tier, error = %e, "Context tier failed, continuing without it");
                None
            }
        }
    }

    async fn company_profile_tier(&self, company_id: Uuid) -> AppResult<Option<String>> {
        let company = DatabaseOperations::get_company(self.pool, company_id).await?;
        Ok(company.as_ref().and_then(render_company_digest))
    }

    async fn document_tier(
        &self,
        company_id: Uuid,
        agent_id: Uuid,
        queries: &[String],
    ) -> AppResult<Option<String>> {
        if queries.is_empty() {
            return Ok(None);
        }

        let embeddings = EmbeddingClient::from_config(self.config);
        let matches = VectorSearch::search(
            self.pool,
            &embeddings,
            queries,
            SearchScope {
                company_id,
                agent_id: Some(agent_id),
            },
            SearchLimits {
                similarity_threshold: self.config.limits.similarity_threshold,
                match_count: self.config.limits.match_count,
                max_documents: self.config.limits.max_context_documents,
                embedding_timeout_secs: self.config.limits.embedding_timeout_secs,
            },
        )
        .await?;

        if matches.is_empty() {
            return Ok(None);
        }

        let excerpt_chars = self.config.limits.document_excerpt_chars;
        let rendered: Vec<String> = matches
            .iter()
            .map(|m| {
                format!(
                    "Document: {}\n{}",
                    m.title,
                    truncate_with_ellipsis(&m.content, excerpt_chars)
                )
            })
            .collect();

        Ok(Some(rendered.join("\n\n")))
    }

    async fn drive_tier(&self, company_id: Uuid, base_query: &str) -> AppResult<Option<String>> {
        let Some(company) = DatabaseOperations::get_company(self.pool, company_id).await? else {
            return Ok(None);
        };

        let (Some(folder_id), Some(token)) =
            (company.drive_folder_id.as_deref(), company.drive_access_token.as_deref())
        else {
            return Ok(None);
        };

        let client = DriveClient::new(&self.config.drive.api_base, token);
        let timeout = self.config.limits.search_timeout_secs;

        let files = with_timeout("drive search", timeout, async {
            client
                .search(base_query, folder_id, self.config.limits.max_drive_files)
                .await
                .map_err(|e| crate::types::AppError::Search(e.to_string()))
        })
        .await?;

        let mut rendered = Vec::new();
        for file in files.iter().take(self.config.limits.max_drive_files) {
            // A single unreadable file never sinks the tier.
            match with_timeout("drive fetch", timeout, async {
                client
                    .fetch_content(file)
                    .await
                    .map_err(|e| crate::types::AppError::Search(e.to_string()))
            })
            .await
            {
                Ok(content) => rendered.push(format!(
                    "File: {}\n{}",
                    file.name,
                    truncate_with_ellipsis(&content, self.config.limits.document_excerpt_chars)
                )),
                Err(e) => {
                    warn!(file = %file.name, error = %e, "Skipping Drive file");
                }
            }
        }

        if rendered.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rendered.join("\n\n")))
        }
    }

    async fn playbook_tier(&self, company_id: Uuid, base_query: &str) -> AppResult<Option<String>> {
        let entries = DatabaseOperations::search_playbook_entries(
            self.pool,
            company_id,
            base_query,
            self.config.limits.max_playbook_entries as i64,
        )
        .await?;

        if entries.is_empty() {
            return Ok(None);
        }

        let excerpt_chars = self.config.limits.document_excerpt_chars;
        let rendered: Vec<String> = entries
            .iter()
            .map(|e| {
                let tags = e
                    .tags
                    .as_ref()
                    .filter(|t| !t.is_empty())
                    .map(|t| t.join(", "))
                    .unwrap_or_else(|| "-".to_string());
                let body = e
                    .markdown
                    .as_deref()
                    .or(e.description.as_deref())
                    .unwrap_or("");
                format!(
                    "Entry: {} [section: {} | status: {} | tags: {}]\n{}",
                    e.title,
                    e.section.as_deref().unwrap_or("-"),
                    e.status.as_deref().unwrap_or("-"),
                    tags,
                    truncate_with_ellipsis(body, excerpt_chars)
                )
            })
            .collect();

        Ok(Some(rendered.join("\n\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(full: bool) -> Company {
        Company {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
            mission: Some("Make things".to_string()),
            vision: Some("Everything made".to_string()),
            core_values: Some("Quality".to_string()),
            positioning: Some("Premium".to_string()),
            pain_points: Some("Slow tooling".to_string()),
            value_propositions: if full {
                Some("Fast tooling".to_string())
            } else {
                None
            },
            drive_folder_id: None,
            drive_access_token: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn digest_renders_complete_records() {
        let digest = render_company_digest(&company(true)).unwrap();
        assert!(digest.contains("Mission: Make things"));
        assert!(digest.contains("Value Propositions: Fast tooling"));
    }

    #[test]
    fn digest_fails_closed_on_partial_records() {
        assert!(render_company_digest(&company(false)).is_none());
    }

    #[test]
    fn assemble_joins_nonempty_tiers_in_order() {
        let ctx = assemble_context(vec![
            TierSection {
                header: COMPANY_HEADER,
                body: Some("profile".to_string()),
            },
            TierSection {
                header: DOCUMENTS_HEADER,
                body: None,
            },
            TierSection {
                header: DRIVE_HEADER,
                body: Some("files".to_string()),
            },
            TierSection {
                header: PLAYBOOK_HEADER,
                body: Some("entries".to_string()),
            },
        ]);

        assert!(ctx.context_used);
        let company_pos = ctx.sections.find(COMPANY_HEADER).unwrap();
        let drive_pos = ctx.sections.find(DRIVE_HEADER).unwrap();
        let playbook_pos = ctx.sections.find(PLAYBOOK_HEADER).unwrap();
        assert!(company_pos < drive_pos && drive_pos < playbook_pos);
        assert!(!ctx.sections.contains(DOCUMENTS_HEADER));
    }

    #[test]
    fn assemble_handles_all_tiers_failing() {
        let ctx = assemble_context(vec![
            TierSection {
                header: COMPANY_HEADER,
                body: None,
            },
            TierSection {
                header: DOCUMENTS_HEADER,
                body: None,
            },
            TierSection {
                header: DRIVE_HEADER,
                body: None,
            },
            TierSection {
                header: PLAYBOOK_HEADER,
                body: None,
            },
        ]);

        assert!(!ctx.context_used);
        assert!(ctx.sections.is_empty());
    }

    #[test]
    fn assemble_ignores_whitespace_only_bodies() {
        let ctx = assemble_context(vec![TierSection {
            header: COMPANY_HEADER,
            body: Some("   \n ".to_string()),
        }]);
        assert!(!ctx.context_used);
    }

    #[test]
    fn assemble_single_tier_combinations() {
        for present in 0..4usize {
            let tiers: Vec<TierSection> = [
                COMPANY_HEADER,
                DOCUMENTS_HEADER,
                DRIVE_HEADER,
                PLAYBOOK_HEADER,
            ]
            .iter()
            .enumerate()
            .map(|(i, header)| TierSection {
                header,
                body: (i == present).then(|| "content".to_string()),
            })
            .collect();

            let expected_header = tiers[present].header;
            let ctx = assemble_context(tiers);
            assert!(ctx.context_used);
            assert!(ctx.sections.starts_with(expected_header));
        }
    }
}
