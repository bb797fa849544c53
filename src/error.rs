//! Error types for nanostore

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid value '{value}' for field '{field}': must be one of [{}]", .allowed.join(", "))]
    Validation {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("document with ID '{0}' not found")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Error::NotFound(id.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Error::Constraint(msg.into())
    }

    pub fn validation(field: impl Into<String>, value: impl Into<String>, allowed: &[String]) -> Self {
        Error::Validation {
            field: field.into(),
            value: value.into(),
            allowed: allowed.to_vec(),
        }
    }
}
