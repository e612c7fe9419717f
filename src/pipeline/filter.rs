use std::sync::Arc;

use anyhow::{Context, Error, Result};
use futures_util::future::try_join_all;
use serde_json::json;

use super::model::{LanguageModel, add_usage};
use super::prompt::{Prompt, templates};
use crate::eval::RetrievedContext;
use crate::openai::{Message, Role, Usage};

pub const CONTEXT_RELEVANCE: &str = "context_relevance";

/// Guardrail that drops retrieved chunks the model rates as not
/// relevant to the question before they reach generation.
#[derive(Clone)]
pub struct ContextFilter {
    model: Arc<dyn LanguageModel>,
    threshold: f64,
}

pub struct FilterOutcome {
    pub contexts: Vec<RetrievedContext>,
    pub mean_score: Option<f64>,
    pub usage: Option<Usage>,
}

/// First number in the response on a 0-10 scale, normalized to [0, 1].
fn parse_score(text: &str) -> Option<f64> {
    text.split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .find_map(|token| token.parse::<f64>().ok())
        .map(|score| score.clamp(0.0, 10.0) / 10.0)
}

impl ContextFilter {
    pub fn new(model: Arc<dyn LanguageModel>, threshold: f64) -> Self {
        Self { model, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    async fn score(&self, question: &str, context: &str, model: &str) -> Result<(f64, Option<Usage>), Error> {
        let prompt = templates().render(
            &Prompt::ContextRelevance.to_string(),
            &json!({"question": question, "context": context}),
        )?;
        let completion = self
            .model
            .complete(&[Message::new(Role::User, &prompt)], model)
            .await?;

        // An answer we can't read counts as not relevant
        let score = parse_score(&completion.content).unwrap_or_else(|| {
            tracing::warn!("Unparseable relevance score: {}", completion.content);
            0.0
        });
        Ok((score, completion.usage))
    }

    /// Rate every chunk concurrently, keeping the original order.
    pub async fn apply(
        &self,
        question: &str,
        chunks: Vec<String>,
        model: &str,
    ) -> Result<FilterOutcome, Error> {
        let futures = chunks.iter().map(|chunk| self.score(question, chunk, model));
        let scores = try_join_all(futures)
            .await
            .context("Context filter guardrail failed")?;

        let mut usage = None;
        let mut contexts = Vec::with_capacity(chunks.len());
        for (text, (score, u)) in chunks.into_iter().zip(scores) {
            usage = add_usage(usage, u);
            contexts.push(RetrievedContext {
                text,
                score: Some(score),
                kept: score >= self.threshold,
            });
        }

        let mean_score = if contexts.is_empty() {
            None
        } else {
            let total: f64 = contexts.iter().filter_map(|c| c.score).sum();
            Some(total / contexts.len() as f64)
        };

        tracing::debug!(
            "Context filter kept {} of {} chunks",
            contexts.iter().filter(|c| c.kept).count(),
            contexts.len()
        );

        Ok(FilterOutcome {
            contexts,
            mean_score,
            usage,
        })
    }
}
