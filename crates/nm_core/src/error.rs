use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("rate limited by {provider} after {attempts} attempt(s)")]
    RateLimited { provider: String, attempts: u32 },

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid agent configuration: {0}")]
    InvalidAgent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("external error: {0}")]
    External(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
