// Similarity search over the document corpus

use sqlx::PgPool;
use uuid::Uuid;

use crate::db::DatabaseOperations;
use crate::embeddings::EmbeddingClient;
use crate::models::DocumentMatch;
use crate::types::AppResult;
use crate::utils::{with_retry, with_timeout};

const EMBED_ATTEMPTS: u32 = 2;

pub struct VectorSearch;

#[derive(Debug, Clone, Copy)]
pub struct SearchScope {
    pub company_id: Uuid,
    pub agent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub similarity_threshold: f64,
    pub match_count: i32,
    pub max_documents: usize,
    pub embedding_timeout_secs: u64,
}

impl VectorSearch {
    /// Embed each query and collect ranked matches, deduplicated across
    /// queries by document id (first hit wins, queries run in order).
    pub async fn search(
        pool: &PgPool,
        embeddings: &EmbeddingClient,
        queries: &[String],
        scope: SearchScope,
        limits: SearchLimits,
    ) -> AppResult<Vec<DocumentMatch>> {
        let mut seen = std::collections::HashSet::new();
        let mut results: Vec<DocumentMatch> = Vec::new();

        for query in queries {
            if results.len() >= limits.max_documents {
                break;
            }

            let embedding = with_retry(
                || {
                    with_timeout(
                        "embedding generation",
                        limits.embedding_timeout_secs,
                        embeddings.embed(query),
                    )
                },
                EMBED_ATTEMPTS,
            )
            .await?;

            let matches = DatabaseOperations::match_documents(
                pool,
                &embedding,
                limits.similarity_threshold,
                limits.match_count,
                scope.company_id,
                scope.agent_id,
            )
            .await?;

            for m in matches {
                if results.len() >= limits.max_documents {
                    break;
                }
                if seen.insert(m.id) {
                    results.push(m);
                }
            }
        }

        Ok(results)
    }
}
