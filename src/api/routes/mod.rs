//! API routes module

pub mod chat;
pub mod metrics;
pub mod services;

use std::sync::{Arc, RwLock};

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<RwLock<AppState>>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Chat session routes
        .nest("/chat", chat::router())
        // Search service metadata
        .nest("/services", services::router())
        // Evaluation metrics and traces
        .nest("/metrics", metrics::router())
}
