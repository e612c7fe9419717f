//! Router for the chat API

use std::sync::{Arc, RwLock};

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post, put},
};

use super::public;
use crate::api::public::ApiError;
use crate::api::state::{AppState, SharedSession};
use crate::session::{ConfigurationUpdate, Session, SessionController};

type SharedState = Arc<RwLock<AppState>>;

/// Look up the session and the controller without holding the state
/// lock across any await point.
fn session_and_controller(state: &SharedState, id: &str) -> (SharedSession, SessionController) {
    let mut shared_state = state.write().expect("Unable to write shared state");
    (shared_state.session(id), shared_state.controller.clone())
}

fn session_response(session: &Session) -> public::SessionResponse {
    public::SessionResponse {
        session_id: session.id.clone(),
        transcript: session.transcript().messages().to_vec(),
        configuration: session.configuration().cloned(),
        use_filters: session.use_filters(),
    }
}

/// Submit a prompt to a chat session and wait for the answer
async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<public::ChatRequest>, JsonRejection>,
) -> Result<Json<public::ChatResponse>, ApiError> {
    let Json(payload) = payload?;
    let (session, controller) = session_and_controller(&state, &payload.session_id);

    // Held for the whole turn so prompts to one session never overlap
    let mut session = session.lock().await;
    controller.initialize_session(&mut session).await;
    let turn = controller
        .submit_prompt(&mut session, &payload.message, payload.use_filters)
        .await?;

    Ok(Json(public::ChatResponse {
        answer: turn.answer,
        record: turn.record,
        warnings: turn.warnings,
    }))
}

/// Get a chat session by ID, starting a new one if needed
async fn chat_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<public::SessionResponse>, ApiError> {
    let (session, controller) = session_and_controller(&state, &id);
    let mut session = session.lock().await;
    controller.initialize_session(&mut session).await;
    Ok(Json(session_response(&session)))
}

/// Clear the conversation and re-seed the greeting
async fn clear_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<public::SessionResponse>, ApiError> {
    let (session, controller) = session_and_controller(&state, &id);
    let mut session = session.lock().await;
    controller.clear_conversation(&mut session);
    controller.initialize_session(&mut session).await;
    Ok(Json(session_response(&session)))
}

/// Change one or more configuration options
async fn update_config(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    update: Result<Json<ConfigurationUpdate>, JsonRejection>,
) -> Result<Json<public::ConfigurationResponse>, ApiError> {
    // Unknown model names are rejected here
    let Json(update) = update?;
    let (session, controller) = session_and_controller(&state, &id);
    let mut session = session.lock().await;
    controller.initialize_session(&mut session).await;
    let configuration = controller.update_configuration(&mut session, update).clone();
    Ok(Json(public::ConfigurationResponse { configuration }))
}

/// End a chat session
async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .write()
        .expect("Unable to write shared state")
        .remove_session(&id);
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Session {}", id)))
    }
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(chat_handler))
        .route("/{id}", get(chat_session).delete(delete_session))
        .route("/{id}/clear", post(clear_session))
        .route("/{id}/config", put(update_config))
}
