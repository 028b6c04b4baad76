use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("no API key: set {0}")]
    MissingCredentials(String),

    #[error("assistant command '{0}' not found on PATH")]
    CommandNotFound(String),

    #[error("no reply within {0}s")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected reply: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
