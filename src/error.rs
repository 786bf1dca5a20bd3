use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageScopeError {
    #[error("Azure DevOps API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StageScopeError {
    /// Whether the failure came from talking to the remote platform.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Api { .. } | Self::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, StageScopeError>;
