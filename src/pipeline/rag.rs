use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::filter::{CONTEXT_RELEVANCE, ContextFilter};
use super::model::{LanguageModel, add_usage};
use super::prompt::{Prompt, templates};
use super::{Pipeline, PipelineRequest};
use crate::eval::{AppId, FeedbackResult, QueryRecord, RetrievedContext, TraceSpan};
use crate::openai::{Message, Role};
use crate::search::Retriever;

fn elapsed_ms(since: Instant) -> i64 {
    since.elapsed().as_millis() as i64
}

/// Retrieve, optionally filter, then generate.
pub struct RagPipeline {
    retriever: Arc<dyn Retriever>,
    model: Arc<dyn LanguageModel>,
    filter: Option<ContextFilter>,
}

impl RagPipeline {
    pub fn standard(retriever: Arc<dyn Retriever>, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            retriever,
            model,
            filter: None,
        }
    }

    /// Same as `standard` with the context filter guardrail applied to
    /// retrieved chunks.
    pub fn filtered(
        retriever: Arc<dyn Retriever>,
        model: Arc<dyn LanguageModel>,
        threshold: f64,
    ) -> Self {
        let filter = ContextFilter::new(Arc::clone(&model), threshold);
        Self {
            retriever,
            model,
            filter: Some(filter),
        }
    }
}

#[async_trait]
impl Pipeline for RagPipeline {
    fn app_id(&self) -> AppId {
        if self.filter.is_some() {
            AppId::Filtered
        } else {
            AppId::Standard
        }
    }

    async fn query(&self, request: &PipelineRequest) -> Result<(QueryRecord, String), Error> {
        let started = Instant::now();
        let options = &request.options;
        let model_name = options.model.as_str();
        let mut spans = Vec::new();
        let mut usage = None;
        let mut feedback = Vec::new();

        let step = Instant::now();
        let chunks = self
            .retriever
            .retrieve(&options.service, &request.prompt, options.num_chunks)
            .await
            .with_context(|| format!("Search service {} query failed", options.service.name))?;
        spans.push(TraceSpan {
            name: "retrieve".into(),
            detail: format!("{} chunks from {}", chunks.len(), options.service.name),
            duration_ms: elapsed_ms(step),
        });

        let contexts = match &self.filter {
            Some(filter) => {
                let step = Instant::now();
                let outcome = filter.apply(&request.prompt, chunks, model_name).await?;
                let kept = outcome.contexts.iter().filter(|c| c.kept).count();
                spans.push(TraceSpan {
                    name: "filter".into(),
                    detail: format!(
                        "kept {} of {} chunks at threshold {}",
                        kept,
                        outcome.contexts.len(),
                        filter.threshold()
                    ),
                    duration_ms: elapsed_ms(step),
                });
                if let Some(score) = outcome.mean_score {
                    feedback.push(FeedbackResult {
                        name: CONTEXT_RELEVANCE.into(),
                        score,
                    });
                }
                usage = add_usage(usage, outcome.usage);
                outcome.contexts
            }
            None => chunks
                .into_iter()
                .map(|text| RetrievedContext {
                    text,
                    score: None,
                    kept: true,
                })
                .collect(),
        };

        let kept: Vec<&str> = contexts
            .iter()
            .filter(|c| c.kept)
            .map(|c| c.text.as_str())
            .collect();
        let history = request.chat_history.clone().unwrap_or_default();
        let prompt = templates().render(
            &Prompt::Answer.to_string(),
            &json!({
                "question": request.prompt,
                "contexts": kept,
                "history": history,
            }),
        )?;

        let step = Instant::now();
        let completion = self
            .model
            .complete(&[Message::new(Role::User, &prompt)], model_name)
            .await
            .with_context(|| format!("Model {} completion failed", model_name))?;
        spans.push(TraceSpan {
            name: "generate".into(),
            detail: format!("{} with {} context chunks", model_name, kept.len()),
            duration_ms: elapsed_ms(step),
        });
        usage = add_usage(usage, completion.usage);

        let answer = completion.content;
        let record = QueryRecord {
            id: Uuid::new_v4(),
            app_id: self.app_id(),
            prompt: request.prompt.clone(),
            answer: answer.clone(),
            model: model_name.to_string(),
            search_service: options.service.name.clone(),
            timestamp: Utc::now(),
            latency_ms: elapsed_ms(started),
            spans,
            contexts,
            feedback,
            usage,
        };

        Ok((record, answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::Usage;
    use crate::pipeline::QueryOptions;
    use crate::pipeline::model::Completion;
    use crate::search::ServiceMetadata;
    use crate::session::{Message as ChatMessage, ModelName};
    use anyhow::anyhow;
    use std::sync::Mutex;

    struct FixedRetriever(Vec<&'static str>);

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn retrieve(
            &self,
            _service: &crate::search::ServiceMetadata,
            _query: &str,
            limit: usize,
        ) -> Result<Vec<String>, Error> {
            Ok(self.0.iter().take(limit).map(|s| s.to_string()).collect())
        }
    }

    struct DownRetriever;

    #[async_trait]
    impl Retriever for DownRetriever {
        async fn retrieve(
            &self,
            _service: &crate::search::ServiceMetadata,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<String>, Error> {
            Err(anyhow!("connection refused"))
        }
    }

    /// Answers relevance prompts by keyword and records every answer prompt.
    #[derive(Default)]
    struct ScriptedModel {
        answer_prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, messages: &[Message], _model: &str) -> Result<Completion, Error> {
            let prompt = messages[0].content.clone();
            let usage = Some(Usage {
                prompt_tokens: 2,
                completion_tokens: 1,
                total_tokens: 3,
            });
            if prompt.contains("Respond with only the number") {
                let context = prompt.split("CONTEXT:").nth(1).unwrap_or_default();
                let score = if context.contains("brute") { "10" } else { "1" };
                return Ok(Completion {
                    content: score.into(),
                    usage,
                });
            }
            self.answer_prompts.lock().unwrap().push(prompt);
            Ok(Completion {
                content: "It is repeated guessing of credentials.".into(),
                usage,
            })
        }
    }

    fn request(history: Option<Vec<ChatMessage>>) -> PipelineRequest {
        PipelineRequest {
            prompt: "What is a brute-force attack?".into(),
            chat_history: history,
            options: QueryOptions {
                service: ServiceMetadata {
                    name: "alerts_search".into(),
                    search_column: "chunk".into(),
                },
                model: ModelName::Llama3_8b,
                num_chunks: 2,
            },
        }
    }

    const CHUNKS: [&str; 3] = [
        "Alert: brute force against SSH",
        "Alert: public S3 bucket",
        "Alert: unused IAM key",
    ];

    #[tokio::test]
    async fn test_standard_pipeline() {
        let model = Arc::new(ScriptedModel::default());
        let pipeline = RagPipeline::standard(Arc::new(FixedRetriever(CHUNKS.to_vec())), model.clone());
        assert_eq!(pipeline.app_id(), AppId::Standard);

        let (record, answer) = pipeline.query(&request(None)).await.unwrap();
        assert_eq!(answer, "It is repeated guessing of credentials.");
        assert_eq!(record.answer, answer);
        assert_eq!(record.app_id, AppId::Standard);
        assert_eq!(record.search_service, "alerts_search");
        assert_eq!(record.model, "llama3-8b");
        // Limited to `num_chunks`, all kept without scores
        assert_eq!(record.contexts.len(), 2);
        assert!(record.contexts.iter().all(|c| c.kept && c.score.is_none()));
        assert!(record.feedback.is_empty());
        let span_names: Vec<&str> = record.spans.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(span_names, vec!["retrieve", "generate"]);
        assert_eq!(record.usage.unwrap().total_tokens, 3);

        let prompts = model.answer_prompts.lock().unwrap();
        assert!(prompts[0].contains("Alert: public S3 bucket"));
    }

    #[tokio::test]
    async fn test_filtered_pipeline_drops_irrelevant_context() {
        let model = Arc::new(ScriptedModel::default());
        let pipeline =
            RagPipeline::filtered(Arc::new(FixedRetriever(CHUNKS.to_vec())), model.clone(), 0.75);
        assert_eq!(pipeline.app_id(), AppId::Filtered);

        let history = vec![ChatMessage::assistant("Ask me anything about Cloud Security Alerts!")];
        let (record, _) = pipeline.query(&request(Some(history))).await.unwrap();

        assert_eq!(record.app_id, AppId::Filtered);
        let kept: Vec<bool> = record.contexts.iter().map(|c| c.kept).collect();
        assert_eq!(kept, vec![true, false]);
        let relevance = record.feedback_score(CONTEXT_RELEVANCE).unwrap();
        assert!((relevance - 0.55).abs() < 1e-9);
        let span_names: Vec<&str> = record.spans.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(span_names, vec!["retrieve", "filter", "generate"]);
        // Two relevance ratings plus one answer
        assert_eq!(record.usage.unwrap().total_tokens, 9);

        let prompts = model.answer_prompts.lock().unwrap();
        assert!(prompts[0].contains("Alert: brute force against SSH"));
        assert!(!prompts[0].contains("Alert: public S3 bucket"));
        assert!(prompts[0].contains("assistant: Ask me anything about Cloud Security Alerts!"));
    }

    #[tokio::test]
    async fn test_search_failure_is_an_error() {
        let pipeline = RagPipeline::standard(Arc::new(DownRetriever), Arc::new(ScriptedModel::default()));
        let err = pipeline.query(&request(None)).await.unwrap_err();
        assert!(format!("{:#}", err).contains("connection refused"));
    }
}
