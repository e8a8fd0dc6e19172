// Job submission and lifecycle transitions

use sqlx::PgPool;
use std::future::Future;
use tracing::{error, info};
use uuid::Uuid;

use crate::jobs::{Job, JobKind, JobStatus};
use crate::models::AppState;
use crate::types::AppResult;

/// Persist a job row and run the work on a detached task, recording
/// pending → running → succeeded/failed transitions. The caller gets the
/// job id back immediately and must not wait on completion.
pub async fn submit<F, Fut>(
    state: AppState,
    kind: JobKind,
    payload: serde_json::Value,
    work: F,
) -> AppResult<Uuid>
where
    F: FnOnce(AppState) -> Fut + Send + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    let job = create_job(&state.pool, kind, &payload).await?;
    let job_id = job.id;

    tokio::spawn(async move {
        if let Err(e) = mark_status(&state.pool, job_id, JobStatus::Running, None).await {
            error!(job_id = %job_id, error = %e, "Failed to mark job running");
        }

        match work(state.clone()).await {
            Ok(()) => {
                info!(job_id = %job_id, kind = kind.as_str(), "Job succeeded");
                if let Err(e) =
                    mark_status(&state.pool, job_id, JobStatus::Succeeded, None).await
                {
                    error!(job_id = %job_id, error = %e, "Failed to mark job succeeded");
                }
            }
            Err(e) => {
                error!(job_id = %job_id, kind = kind.as_str(), error = %e, "Job failed");
                if let Err(mark_err) =
                    mark_status(&state.pool, job_id, JobStatus::Failed, Some(&e.to_string())).await
                {
                    error!(job_id = %job_id, error = %mark_err, "Failed to mark job failed");
                }
            }
        }
    });

    Ok(job_id)
}

async fn create_job(pool: &PgPool, kind: JobKind, payload: &serde_json::Value) -> AppResult<Job> {
    let job = sqlx::query_as::<_, Job>(
        r#"
        INSERT INTO agent_jobs (kind, status, payload)
        VALUES ($1, 'pending', $2)
        RETURNING *
        "#,
    )
    .bind(kind.as_str())
    .bind(sqlx::types::Json(payload))
    .fetch_one(pool)
    .await?;

    Ok(job)
}

async fn mark_status(
    pool: &PgPool,
    job_id: Uuid,
    status: JobStatus,
    error: Option<&str>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE agent_jobs
        SET status = $2,
            error = $3,
            started_at = CASE WHEN $2 = 'running' THEN NOW() ELSE started_at END,
            finished_at = CASE WHEN $2 IN ('succeeded', 'failed') THEN NOW() ELSE finished_at END
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(status.as_str())
    .bind(error)
    .execute(pool)
    .await?;

    Ok(())
}
