//! The two RAG pipeline variants a prompt can be routed to.
use std::sync::Arc;

use anyhow::{Error, Result};
use async_trait::async_trait;

use crate::core::AppConfig;
use crate::eval::{AppId, QueryRecord};
use crate::search::{SearchClient, ServiceMetadata};
use crate::session::{Message, ModelName};

pub mod filter;
pub mod model;
pub mod prompt;
mod rag;

pub use filter::ContextFilter;
pub use model::{Completion, LanguageModel, OpenAiModel};
pub use rag::RagPipeline;

#[derive(Clone, Debug)]
pub struct QueryOptions {
    pub service: ServiceMetadata,
    pub model: ModelName,
    pub num_chunks: usize,
}

#[derive(Clone, Debug)]
pub struct PipelineRequest {
    pub prompt: String,
    pub chat_history: Option<Vec<Message>>,
    pub options: QueryOptions,
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    fn app_id(&self) -> AppId;

    /// Answer the prompt. Fails when the search service or the model
    /// endpoint can't be reached.
    async fn query(&self, request: &PipelineRequest) -> Result<(QueryRecord, String), Error>;
}

pub type SharedPipeline = Arc<dyn Pipeline>;

#[derive(Clone)]
pub struct Pipelines {
    pub standard: SharedPipeline,
    pub filtered: SharedPipeline,
}

impl Pipelines {
    pub fn new(standard: SharedPipeline, filtered: SharedPipeline) -> Self {
        Self { standard, filtered }
    }

    /// Build both variants against the configured search backend and
    /// model endpoint.
    pub fn from_config(config: &AppConfig) -> Self {
        let search = Arc::new(SearchClient::new(&config.search_api_url));
        let model: Arc<dyn LanguageModel> = Arc::new(OpenAiModel::new(
            &config.openai_api_hostname,
            &config.openai_api_key,
        ));
        Self {
            standard: Arc::new(RagPipeline::standard(search.clone(), Arc::clone(&model))),
            filtered: Arc::new(RagPipeline::filtered(
                search,
                model,
                config.filter_threshold,
            )),
        }
    }

    pub fn select(&self, use_filters: bool) -> &SharedPipeline {
        if use_filters {
            &self.filtered
        } else {
            &self.standard
        }
    }
}
