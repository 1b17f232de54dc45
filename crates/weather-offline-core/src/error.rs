use thiserror::Error;

/// Failure to obtain a response from the network layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cannot cache {0} requests")]
    UnsupportedMethod(String),

    #[error("Cannot cache partial response for {0}")]
    PartialResponse(String),

    #[error("Cache container not found: {0}")]
    NotFound(String),
}

/// Errors surfaced by the page-side view of a worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("Worker terminated before completing the event")]
    Terminated,

    #[error("Registration failed: {0}")]
    RegistrationFailed(String),
}
