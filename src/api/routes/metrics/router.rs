//! Router for the metrics API

use std::sync::{Arc, RwLock};

use axum::{
    Router,
    extract::{Path, State},
    response::Json,
    routing::get,
};
use axum_extra::extract::Query;

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::eval::EvalSession;
use crate::render::{FeedbackRenderer, TextRenderer, TraceRenderer};

type SharedState = Arc<RwLock<AppState>>;

fn eval(state: &SharedState) -> EvalSession {
    state
        .read()
        .expect("Unable to read share state")
        .controller
        .eval()
        .clone()
}

/// Get aggregate evaluation metrics
async fn leaderboard(
    State(state): State<SharedState>,
    Query(params): Query<public::LeaderboardQuery>,
) -> Result<Json<public::LeaderboardResponse>, ApiError> {
    let mut apps = eval(&state).leaderboard().await?;
    if let Some(include) = params.app {
        apps.retain(|row| include.contains(&row.app_id));
    }
    Ok(Json(public::LeaderboardResponse { apps }))
}

/// Get a single record with its trace and feedback
async fn record(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<public::RecordResponse>, ApiError> {
    let record = eval(&state)
        .find_record(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Record {}", id)))?;

    let mut trace = TextRenderer::new(Vec::new());
    trace.render_trace(&record)?;
    let mut feedback = TextRenderer::new(Vec::new());
    feedback.render_feedback(&record)?;

    Ok(Json(public::RecordResponse {
        record,
        trace: String::from_utf8_lossy(&trace.into_inner()).into_owned(),
        feedback: String::from_utf8_lossy(&feedback.into_inner()).into_owned(),
    }))
}

/// Create the metrics router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(leaderboard))
        .route("/records/{id}", get(record))
}
