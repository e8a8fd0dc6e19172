// Crewchat - AI-native team chat backend with multi-agent message routing

pub mod config;
pub mod db;
pub mod models;
pub mod types;
pub mod agents;
pub mod llm;
pub mod embeddings;
pub mod drive;     // External linked-folder search
pub mod docparse;  // External document parse service client
pub mod storage;
pub mod context;   // Tiered context retrieval and prompt composition
pub mod jobs;      // Tracked background jobs (chain continuation, analysis)
pub mod realtime;  // Push event fan-out
pub mod reconcile; // Client-side message reconciliation
pub mod routes;
pub mod middleware;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
