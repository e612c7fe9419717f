use std::sync::Arc;
use std::time::Duration;

use anyhow::{Error, Result};
use serde::Serialize;

use super::error::SessionError;
use super::models::{Configuration, ConfigurationUpdate, GREETING, Message, Session};
use crate::core::AppConfig;
use crate::eval::{EvalSession, QueryRecord};
use crate::pipeline::{PipelineRequest, Pipelines, QueryOptions};
use crate::search::{SearchClient, ServiceCatalog};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// The outcome of a successful `submit_prompt`.
#[derive(Clone, Debug, Serialize)]
pub struct Turn {
    pub answer: String,
    pub record: QueryRecord,
    // Problems that didn't fail the turn but the user should see
    pub warnings: Vec<String>,
}

/// Drives one chat turn at a time against explicitly passed
/// `Session`s. Holds only process-wide collaborators, so one controller
/// can serve any number of independent sessions.
#[derive(Clone)]
pub struct SessionController {
    pipelines: Pipelines,
    catalog: Arc<ServiceCatalog>,
    eval: EvalSession,
    timeout: Duration,
}

impl SessionController {
    pub fn new(pipelines: Pipelines, catalog: Arc<ServiceCatalog>, eval: EvalSession) -> Self {
        Self {
            pipelines,
            catalog,
            eval,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Wire up the real collaborators for a process. Startup mode
    /// decides whether old evaluation records are wiped and whether
    /// service metadata is fetched now or on first use.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let eval = EvalSession::open(&config.eval_db_path, config.startup.reset_eval_db).await?;
        let catalog = Arc::new(ServiceCatalog::new(Arc::new(SearchClient::new(
            &config.search_api_url,
        ))));
        if config.startup.eager_metadata {
            let snapshot = catalog.snapshot().await;
            if let Some(warning) = snapshot.warning {
                tracing::warn!("{}", warning);
            }
        }
        let controller = Self::new(Pipelines::from_config(config), catalog, eval)
            .with_timeout(config.pipeline_timeout);
        Ok(controller)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &Arc<ServiceCatalog> {
        &self.catalog
    }

    pub fn eval(&self) -> &EvalSession {
        &self.eval
    }

    /// Establish defaults and seed the greeting. Calling this again is
    /// a no-op unless the conversation was cleared in between.
    pub async fn initialize_session(&self, session: &mut Session) {
        if session.clear_requested {
            session.transcript.clear();
            session.clear_requested = false;
        }

        let needs_service = session
            .configuration
            .as_ref()
            .is_none_or(|c| c.selected_search_service.is_none());
        if needs_service {
            let default_service = self.catalog.services().await.into_iter().next().map(|s| s.name);
            let config = session.configuration.get_or_insert_with(Configuration::default);
            config.selected_search_service = default_service;
        }

        if session.transcript.is_empty() {
            session.transcript.push(Message::assistant(GREETING));
        }
    }

    /// Replace the session's configuration, clamping numeric fields.
    pub fn apply_configuration<'a>(
        &self,
        session: &'a mut Session,
        config: Configuration,
    ) -> &'a Configuration {
        let config = config.clamped();
        tracing::debug!("Session {} configuration: {:?}", session.id, config);
        session.configuration.insert(config)
    }

    /// Merge a partial change onto the current configuration.
    pub fn update_configuration<'a>(
        &self,
        session: &'a mut Session,
        update: ConfigurationUpdate,
    ) -> &'a Configuration {
        let base = session.configuration.clone().unwrap_or_default();
        self.apply_configuration(session, update.merge(base))
    }

    pub fn clear_conversation(&self, session: &mut Session) {
        session.transcript.clear();
        session.clear_requested = true;
        session.last_record = None;
    }

    /// Run one full turn. On failure the user's message stays in the
    /// transcript and no assistant message is added.
    pub async fn submit_prompt(
        &self,
        session: &mut Session,
        text: &str,
        use_filters: bool,
    ) -> Result<Turn, SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::InvalidInput {
                message: String::from("Prompt must not be empty"),
            });
        }

        // Keeps the greeting-first invariant for sessions that skipped it
        if session.transcript.is_empty() || session.clear_requested {
            self.initialize_session(session).await;
        }

        let config = session
            .configuration
            .clone()
            .ok_or_else(|| SessionError::Configuration {
                message: String::from("Session has no configuration"),
            })?;
        let service_name =
            config
                .selected_search_service
                .clone()
                .ok_or_else(|| SessionError::Configuration {
                    message: String::from("No search service selected"),
                })?;
        let service = match self.catalog.find(&service_name).await {
            Some(service) => service,
            None => {
                let mut message = format!("Unknown search service \"{}\"", service_name);
                if let Some(warning) = self.catalog.snapshot().await.warning {
                    message = format!("{}. {}", message, warning);
                }
                return Err(SessionError::Configuration { message });
            }
        };

        let chat_history = config.use_chat_history.then(|| {
            session
                .transcript
                .window(session.transcript.len(), config.num_chat_messages)
        });

        session.transcript.push(Message::user(text));
        session.use_filters = use_filters;

        let pipeline = self.pipelines.select(use_filters);
        let request = PipelineRequest {
            prompt: text.to_string(),
            chat_history,
            options: QueryOptions {
                service,
                model: config.model_name,
                num_chunks: config.num_retrieved_chunks,
            },
        };

        tracing::info!(
            "Session {} submitting prompt to {} pipeline",
            session.id,
            pipeline.app_id()
        );

        let (record, answer) = match tokio::time::timeout(self.timeout, pipeline.query(&request)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::error!("Pipeline error: {}. Root cause: {}", e, e.root_cause());
                return Err(SessionError::pipeline(&e));
            }
            Err(_) => {
                tracing::error!("Pipeline timed out after {:?}", self.timeout);
                return Err(SessionError::PipelineUnavailable {
                    message: format!("No response after {} seconds", self.timeout.as_secs()),
                });
            }
        };

        session.transcript.push(Message::assistant(&answer));

        let mut warnings = Vec::new();
        if let Err(e) = self.eval.record(&record).await {
            tracing::error!("Failed to store evaluation record {}: {:#}", record.id, e);
            warnings.push(format!("Evaluation record was not saved: {:#}", e));
        }
        session.last_record = Some(record.clone());

        Ok(Turn {
            answer,
            record,
            warnings,
        })
    }
}
