/// Turn-level failures reported by the `SessionController`. None of
/// these end the session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Pipeline unavailable: {message}")]
    PipelineUnavailable { message: String },

    #[error("Search service metadata unavailable: {message}")]
    MetadataUnavailable { message: String },
}

impl SessionError {
    /// Stable identifier for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::InvalidInput { .. } => "invalid_input",
            SessionError::Configuration { .. } => "configuration",
            SessionError::PipelineUnavailable { .. } => "pipeline_unavailable",
            SessionError::MetadataUnavailable { .. } => "metadata_unavailable",
        }
    }

    pub(crate) fn pipeline(err: &anyhow::Error) -> Self {
        // Include the whole cause chain so connection errors are legible
        SessionError::PipelineUnavailable {
            message: format!("{:#}", err),
        }
    }
}
