//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// No parser recognized the file, or only with too little confidence
    #[error("Unrecognized file format: {0}")]
    UnrecognizedFormat(String),

    #[error("Unknown bank format: {0}")]
    UnknownParser(String),

    /// Structural problems that block parsing entirely
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Attempt to rename or delete a protected category
    #[error("System category: {0}")]
    SystemCategory(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
