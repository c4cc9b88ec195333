use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response from {backend}: {details}")]
    Backend { backend: String, details: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl RagError {
    /// Maps a non-success HTTP status onto the error kind the caller acts on.
    pub fn from_status(backend: &str, status: StatusCode, body: &str) -> Self {
        let details = if body.trim().is_empty() {
            status.to_string()
        } else {
            format!("{status}: {}", body.trim())
        };

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                RagError::Auth(format!("{backend} rejected the request ({details})"))
            }
            StatusCode::NOT_FOUND => RagError::NotFound(format!("{backend} ({details})")),
            _ => RagError::Backend {
                backend: backend.to_string(),
                details,
            },
        }
    }
}

pub type Result<T, E = RagError> = std::result::Result<T, E>;
