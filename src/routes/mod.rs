//! API Routes
//!
//! This module organizes all HTTP endpoints for the application:
//! - `/api/chat` - private conversation send
//! - `/api/channels/{id}/messages` - channel send with mention chains
//! - `/api/messages` - poll surface and analysis retry
//! - `/api/ws` - push-delivered message events
//! - `/api/health` - health checks

pub mod channels;
pub mod chat;
pub mod health;
pub mod messages;
pub mod ws;

use axum::{middleware as axum_middleware, Router};

use crate::middleware::{apply_cors, auth_middleware, rate_limiter_middleware};
use crate::models::AppState;

/// Create the main application router with auth, rate limiting, and CORS
/// applied around the API routes.
pub fn create_router(state: AppState) -> Router {
    let api_router = Router::new()
        .merge(chat::router(state.clone()))
        .merge(channels::router(state.clone()))
        .merge(messages::router(state.clone()))
        .merge(ws::router(state.clone()))
        .merge(health::router(state.clone()))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn(rate_limiter_middleware))
        .layer(tower_http::trace::TraceLayer::new_for_http());

    apply_cors(api_router, &state.config.server)
}
