use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CharterError {
    #[error("SQLite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Config error: {0}")]
    Config(String),
}
