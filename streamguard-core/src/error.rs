use thiserror::Error;

/// Domain-level error taxonomy (spec §7). The HTTP edge
/// (`streamguard-server::infra::errors::AppError`) maps each variant to a
/// status code; everywhere else this is the error type propagated with
/// `?`.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("ms request failed: {0}")]
    Ms(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("credential decryption failed")]
    DecryptionFailed,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl From<streamguard_model::error::ModelError> for CoreError {
    fn from(err: streamguard_model::error::ModelError) -> Self {
        CoreError::Validation(err.to_string())
    }
}
