use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoThreadError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Overloaded: {0}")]
    Overloaded(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for RepoThreadError {
    fn from(err: std::io::Error) -> Self {
        RepoThreadError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for RepoThreadError {
    fn from(err: serde_json::Error) -> Self {
        RepoThreadError::Storage(err.to_string())
    }
}

impl From<uuid::Error> for RepoThreadError {
    fn from(err: uuid::Error) -> Self {
        RepoThreadError::Validation(err.to_string())
    }
}

impl From<reqwest::Error> for RepoThreadError {
    fn from(err: reqwest::Error) -> Self {
        RepoThreadError::Generation(err.to_string())
    }
}
