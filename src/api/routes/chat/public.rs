//! Public types for the chat API
use serde::{Deserialize, Serialize};

use crate::eval::QueryRecord;
use crate::session::{Configuration, Message};

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    #[serde(default)]
    pub use_filters: bool,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub record: QueryRecord,
    pub warnings: Vec<String>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub transcript: Vec<Message>,
    pub configuration: Option<Configuration>,
    pub use_filters: bool,
}

#[derive(Serialize)]
pub struct ConfigurationResponse {
    pub configuration: Configuration,
}
