use thiserror::Error;

/// Main error type for Patchwright operations
#[derive(Error, Debug)]
pub enum PatchwrightError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parser error: {0}")]
    Parser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Cache snapshot error: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, PatchwrightError>;
