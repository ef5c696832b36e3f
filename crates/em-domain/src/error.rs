use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("invalid image location '{0}'")]
    InvalidLocation(String),
}
