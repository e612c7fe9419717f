//! Test utilities for integration tests
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::{Router, body::Body};
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::json;

use alertqa::api::AppState;
use alertqa::api::app;
use alertqa::core::{AppConfig, StartupMode};
use alertqa::eval::EvalSession;
use alertqa::pipeline::Pipelines;
use alertqa::search::{SearchClient, ServiceCatalog};
use alertqa::session::SessionController;

pub const ANSWER: &str = "GuardDuty reports unusual API calls.";

/// A running app whose search backend and model endpoint are both
/// served by `server`. Keep the server alive for the whole test.
pub struct TestApp {
    pub router: Router,
    pub server: ServerGuard,
    pub eval: EvalSession,
}

fn completion_body(content: &str) -> String {
    json!({
        "choices": [{"message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
    })
    .to_string()
}

/// Mocks the service listing. Pass `false` to make it fail.
pub async fn mock_services(server: &mut ServerGuard, up: bool) -> Mock {
    let mock = server.mock("GET", "/services");
    let mock = if up {
        mock.with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"services": [
                    {"name": "alerts_search", "search_column": "chunk"},
                    {"name": "runbooks_search", "search_column": "text"}
                ]})
                .to_string(),
            )
    } else {
        mock.with_status(500)
    };
    mock.create_async().await
}

/// Mocks retrieval, the answer and the relevance rating. Every chunk
/// is rated `relevance` out of 10.
pub async fn mock_pipeline(server: &mut ServerGuard, relevance: &str) {
    server
        .mock("POST", "/services/alerts_search/query")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"results": [
                {"chunk": "GuardDuty raises an alert for unusual API calls."},
                {"chunk": "Security Hub aggregates findings."}
            ]})
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::Regex(String::from("Answer the QUESTION")))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body(ANSWER))
        .create_async()
        .await;
    server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::Regex(String::from("Respond with only the number")))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body(relevance))
        .create_async()
        .await;
}

pub fn test_config(server: &ServerGuard) -> AppConfig {
    AppConfig {
        storage_path: String::from("./"),
        eval_db_path: String::from(":memory:"),
        search_api_url: server.url(),
        openai_api_hostname: server.url(),
        openai_api_key: String::from("test-api-key"),
        filter_threshold: 0.75,
        pipeline_timeout: Duration::from_secs(5),
        startup: StartupMode::default(),
    }
}

/// Creates a test application with the services listing up and
/// every chunk rated highly relevant.
pub async fn test_app() -> TestApp {
    let mut server = mockito::Server::new_async().await;
    mock_services(&mut server, true).await;
    mock_pipeline(&mut server, "9").await;
    test_app_with(server).await
}

/// Creates a test application against an already mocked server.
pub async fn test_app_with(server: ServerGuard) -> TestApp {
    let config = test_config(&server);
    let eval = EvalSession::in_memory()
        .await
        .expect("Failed to open eval db");
    let catalog = Arc::new(ServiceCatalog::new(Arc::new(SearchClient::new(
        &config.search_api_url,
    ))));
    let controller = SessionController::new(Pipelines::from_config(&config), catalog, eval.clone())
        .with_timeout(config.pipeline_timeout);
    let app_state = AppState::new(controller);
    TestApp {
        router: app(Arc::new(RwLock::new(app_state))),
        server,
        eval,
    }
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not utf8")
}

pub async fn body_to_json(body: Body) -> serde_json::Value {
    serde_json::from_str(&body_to_string(body).await).expect("Body is not json")
}
