use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PacingError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown sequence: {0}")]
    UnknownSequence(String),

    #[error("Processing failed for item {item_id}: {message}")]
    ProcessingFailure { item_id: String, message: String },

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PacingError>;
