use anyhow::{Error, Result};
use async_trait::async_trait;

use crate::openai::{Message, Usage, completion, completion_content, completion_usage};

#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: Option<Usage>,
}

/// A chat completion endpoint.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, messages: &[Message], model: &str) -> Result<Completion, Error>;
}

/// Any OpenAI compatible API
#[derive(Clone, Debug)]
pub struct OpenAiModel {
    api_hostname: String,
    api_key: String,
}

impl OpenAiModel {
    pub fn new(api_hostname: &str, api_key: &str) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn complete(&self, messages: &[Message], model: &str) -> Result<Completion, Error> {
        let resp = completion(messages, &self.api_hostname, &self.api_key, model).await?;
        Ok(Completion {
            content: completion_content(&resp)?,
            usage: completion_usage(&resp),
        })
    }
}

pub(crate) fn add_usage(a: Option<Usage>, b: Option<Usage>) -> Option<Usage> {
    match (a, b) {
        (Some(a), Some(b)) => Some(Usage {
            prompt_tokens: a.prompt_tokens + b.prompt_tokens,
            completion_tokens: a.completion_tokens + b.completion_tokens,
            total_tokens: a.total_tokens + b.total_tokens,
        }),
        (a, None) => a,
        (None, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_usage() {
        let u = Usage {
            prompt_tokens: 1,
            completion_tokens: 2,
            total_tokens: 3,
        };
        assert_eq!(add_usage(None, None), None);
        assert_eq!(add_usage(Some(u), None), Some(u));
        assert_eq!(add_usage(None, Some(u)).unwrap().total_tokens, 3);
        assert_eq!(add_usage(Some(u), Some(u)).unwrap().total_tokens, 6);
    }
}
