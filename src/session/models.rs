//! The core models for a single question-answering chat session.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::eval::QueryRecord;
use crate::openai;

pub const GREETING: &str = "Ask me anything about Cloud Security Alerts!";

/// Bounds shared by `num_retrieved_chunks` and `num_chat_messages`
pub const MIN_COUNT: usize = 1;
pub const MAX_COUNT: usize = 10;
const DEFAULT_COUNT: usize = 5;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: &str) -> Self {
        Self {
            role: Role::User,
            text: text.to_string(),
        }
    }

    pub fn assistant(text: &str) -> Self {
        Self {
            role: Role::Assistant,
            text: text.to_string(),
        }
    }
}

impl From<&Message> for openai::Message {
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            Role::User => openai::Role::User,
            Role::Assistant => openai::Role::Assistant,
        };
        openai::Message::new(role, &msg.text)
    }
}

/// Append-only, oldest first.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Transcript(Vec<Message>);

impl Transcript {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    pub fn push(&mut self, msg: Message) {
        self.0.push(msg)
    }

    pub fn clear(&mut self) {
        self.0.clear()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.0.last()
    }

    /// The last `n` messages that come before position `end`.
    pub fn window(&self, end: usize, n: usize) -> Vec<Message> {
        let end = end.min(self.0.len());
        let start = end.saturating_sub(n);
        self.0[start..end].to_vec()
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub enum ModelName {
    #[default]
    #[serde(rename = "mistral-large2")]
    MistralLarge2,
    #[serde(rename = "snowflake-arctic")]
    SnowflakeArctic,
    #[serde(rename = "llama3-70b")]
    Llama3_70b,
    #[serde(rename = "llama3-8b")]
    Llama3_8b,
}

impl ModelName {
    pub const ALL: [ModelName; 4] = [
        ModelName::MistralLarge2,
        ModelName::SnowflakeArctic,
        ModelName::Llama3_70b,
        ModelName::Llama3_8b,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelName::MistralLarge2 => "mistral-large2",
            ModelName::SnowflakeArctic => "snowflake-arctic",
            ModelName::Llama3_70b => "llama3-70b",
            ModelName::Llama3_8b => "llama3-8b",
        }
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|m| m.as_str() == s.trim())
            .copied()
            .ok_or_else(|| {
                let supported: Vec<&str> = Self::ALL.iter().map(ModelName::as_str).collect();
                format!("Unknown model \"{}\". Supported: {}", s, supported.join(", "))
            })
    }
}

fn clamp_count(n: usize) -> usize {
    n.clamp(MIN_COUNT, MAX_COUNT)
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Configuration {
    pub selected_search_service: Option<String>,
    pub model_name: ModelName,
    pub num_retrieved_chunks: usize,
    pub num_chat_messages: usize,
    pub debug: bool,
    pub use_chat_history: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            selected_search_service: None,
            model_name: ModelName::default(),
            num_retrieved_chunks: DEFAULT_COUNT,
            num_chat_messages: DEFAULT_COUNT,
            debug: false,
            use_chat_history: true,
        }
    }
}

impl Configuration {
    pub fn with_service(service: Option<&str>) -> Self {
        Self {
            selected_search_service: service.map(String::from),
            ..Self::default()
        }
    }

    /// Force numeric fields into `[MIN_COUNT, MAX_COUNT]`.
    pub fn clamped(mut self) -> Self {
        self.num_retrieved_chunks = clamp_count(self.num_retrieved_chunks);
        self.num_chat_messages = clamp_count(self.num_chat_messages);
        self
    }
}

/// A partial change to a `Configuration`, one field per sidebar control.
#[derive(Clone, Deserialize, Debug, Default, PartialEq)]
pub struct ConfigurationUpdate {
    pub selected_search_service: Option<String>,
    pub model_name: Option<ModelName>,
    pub num_retrieved_chunks: Option<i64>,
    pub num_chat_messages: Option<i64>,
    pub debug: Option<bool>,
    pub use_chat_history: Option<bool>,
}

impl ConfigurationUpdate {
    /// Negative input saturates to zero before clamping.
    pub fn merge(self, base: Configuration) -> Configuration {
        let to_count = |n: i64| usize::try_from(n).unwrap_or(0);
        Configuration {
            selected_search_service: self
                .selected_search_service
                .or(base.selected_search_service),
            model_name: self.model_name.unwrap_or(base.model_name),
            num_retrieved_chunks: self
                .num_retrieved_chunks
                .map(to_count)
                .unwrap_or(base.num_retrieved_chunks),
            num_chat_messages: self
                .num_chat_messages
                .map(to_count)
                .unwrap_or(base.num_chat_messages),
            debug: self.debug.unwrap_or(base.debug),
            use_chat_history: self.use_chat_history.unwrap_or(base.use_chat_history),
        }
    }
}

/// One user's chat interaction. Owned by whoever drives the
/// interaction surface and passed into every `SessionController` call.
#[derive(Debug, Default)]
pub struct Session {
    pub id: String,
    pub(crate) transcript: Transcript,
    pub(crate) configuration: Option<Configuration>,
    pub(crate) use_filters: bool,
    pub(crate) clear_requested: bool,
    pub(crate) last_record: Option<QueryRecord>,
}

impl Session {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_ref()
    }

    /// Variant used by the most recent prompt
    pub fn use_filters(&self) -> bool {
        self.use_filters
    }

    pub fn last_record(&self) -> Option<&QueryRecord> {
        self.last_record.as_ref()
    }
}
