//! Error types shared across the choreography engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventideError {
    #[error("dispatch failed: {0}")]
    DispatchError(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("kv store error: {0}")]
    KvError(String),

    #[error("bus error: {0}")]
    BusError(String),

    #[error("http error: {0}")]
    HttpError(String),

    #[error("repository error: {0}")]
    RepositoryError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, EventideError>;

impl From<anyhow::Error> for EventideError {
    fn from(err: anyhow::Error) -> Self {
        EventideError::InternalError(err.to_string())
    }
}
