//! Error types for airctl

use thiserror::Error;

/// Main error type for airctl
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("missing credentials")]
    MissingCredentials,

    #[error("login rejected: {0}")]
    AuthRejected(String),

    #[error("fetching homes rejected: {0}")]
    FetchRejected(String),

    #[error("can't connect to device, topic empty")]
    NoTopic,

    #[error("broker connection failed: {0}")]
    ConnectError(String),

    #[error("status subscription failed: {0}")]
    SubscribeError(String),

    #[error("malformed status payload: {0}")]
    DecodeError(String),

    #[error("publish failed: {0}")]
    PublishError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),
}
