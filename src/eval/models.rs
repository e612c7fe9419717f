//! Records produced by one pipeline invocation and the aggregates
//! computed over them.
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::openai::Usage;

/// Which pipeline variant produced a record
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AppId {
    Standard,
    Filtered,
}

impl AppId {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppId::Standard => "standard",
            AppId::Filtered => "filtered",
        }
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TraceSpan {
    pub name: String,
    pub detail: String,
    pub duration_ms: i64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RetrievedContext {
    pub text: String,
    // Guardrail relevance in [0, 1], only set by the filtered variant
    pub score: Option<f64>,
    pub kept: bool,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct FeedbackResult {
    pub name: String,
    pub score: f64,
}

/// What happened during one pipeline invocation. Never mutated after
/// the pipeline returns it.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct QueryRecord {
    pub id: Uuid,
    pub app_id: AppId,
    pub prompt: String,
    pub answer: String,
    pub model: String,
    pub search_service: String,
    pub timestamp: DateTime<Utc>,
    pub latency_ms: i64,
    pub spans: Vec<TraceSpan>,
    pub contexts: Vec<RetrievedContext>,
    pub feedback: Vec<FeedbackResult>,
    pub usage: Option<Usage>,
}

impl QueryRecord {
    pub fn feedback_score(&self, name: &str) -> Option<f64> {
        self.feedback.iter().find(|f| f.name == name).map(|f| f.score)
    }
}

/// Aggregate metrics for one app across every stored record
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct LeaderboardRow {
    pub app_id: String,
    pub records: i64,
    pub avg_latency_ms: f64,
    pub total_tokens: i64,
    pub feedback: BTreeMap<String, f64>,
}
