//! Router for the search services API

use std::sync::{Arc, RwLock};

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::search::ServiceCatalog;

type SharedState = Arc<RwLock<AppState>>;

fn catalog(state: &SharedState) -> Arc<ServiceCatalog> {
    let shared_state = state.read().expect("Unable to read share state");
    Arc::clone(shared_state.controller.catalog())
}

/// List the selectable search services
async fn list_services(State(state): State<SharedState>) -> Json<public::ServicesResponse> {
    let snapshot = catalog(&state).snapshot().await;
    Json(public::ServicesResponse {
        services: snapshot.services,
        warning: snapshot.warning,
    })
}

/// Drop the cached service list and fetch it again
async fn refresh_services(
    State(state): State<SharedState>,
) -> Result<Json<public::ServicesResponse>, ApiError> {
    let services = catalog(&state).refresh().await?;
    Ok(Json(public::ServicesResponse {
        services,
        warning: None,
    }))
}

/// Create the services router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_services))
        .route("/refresh", post(refresh_services))
}
