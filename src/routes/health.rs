use axum::{extract::State, response::Json as ResponseJson, routing::get, Json, Router};

use crate::models::{AppState, HealthResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> ResponseJson<HealthResponse> {
    let database = match crate::db::pool::health_check(&state.pool).await {
        Ok(_) => "connected".to_string(),
        Err(_) => "unavailable".to_string(),
    };

    let redis = state
        .config
        .redis
        .enabled
        .then(|| "configured".to_string());

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        database,
        redis,
    })
}
