// Domain errors for the municipal tax service.
// Handlers map these onto HTTP statuses; binaries wrap them in anyhow.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaxError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),
}

impl TaxError {
    pub fn validation(msg: impl Into<String>) -> Self {
        TaxError::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        TaxError::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        TaxError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        TaxError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        TaxError::Conflict(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, TaxError>;
