use thiserror::Error;

/// Errors produced by the tabmux protocol and multiplexer layers.
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("codec error: {0}")]
    Codec(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("surface error: {0}")]
    Surface(String),

    #[error("invalid endpoint: {0}")]
    Endpoint(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for MuxError {
    fn from(e: serde_json::Error) -> Self {
        MuxError::Codec(e.to_string())
    }
}

pub type MuxResult<T> = Result<T, MuxError>;
