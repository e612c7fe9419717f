use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ServiceMetadata {
    pub name: String,
    pub search_column: String,
}

/// Lists the search services a user can pick from.
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    async fn list_services(&self) -> Result<Vec<ServiceMetadata>, Error>;
}

/// Fetches the chunks of text most relevant to a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(
        &self,
        service: &ServiceMetadata,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>, Error>;
}

#[derive(Deserialize)]
struct ServicesResponse {
    services: Vec<ServiceMetadata>,
}

#[derive(Deserialize)]
struct QueryResponse {
    results: Vec<Map<String, Value>>,
}

/// HTTP client for the document search backend.
#[derive(Clone, Debug)]
pub struct SearchClient {
    api_base_url: String,
    timeout: Duration,
}

impl SearchClient {
    pub fn new(api_base_url: &str) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = Url::parse(&self.api_base_url)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Invalid search API url: {}", self.api_base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl Default for SearchClient {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8080")
    }
}

#[async_trait]
impl ServiceDirectory for SearchClient {
    async fn list_services(&self) -> Result<Vec<ServiceMetadata>, Error> {
        let url = self.url(&["services"])?;
        let resp: ServicesResponse = reqwest::Client::new()
            .get(url)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.services)
    }
}

#[async_trait]
impl Retriever for SearchClient {
    async fn retrieve(
        &self,
        service: &ServiceMetadata,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>, Error> {
        let url = self.url(&["services", &service.name, "query"])?;
        let payload = json!({
            "query": query,
            "columns": [service.search_column],
            "limit": limit,
        });
        let resp: QueryResponse = reqwest::Client::new()
            .post(url)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Rows without the search column are skipped
        let chunks = resp
            .results
            .iter()
            .filter_map(|row| row.get(&service.search_column))
            .filter_map(Value::as_str)
            .map(String::from)
            .collect();
        Ok(chunks)
    }
}
