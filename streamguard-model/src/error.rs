use thiserror::Error;

/// Validation failures surfaced while constructing or mutating domain
/// entities, independent of how they are persisted or transported.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("slug must be URL-safe and non-empty: {0:?}")]
    InvalidSlug(String),

    #[error("primary_token and loop_token must differ")]
    TokensMustDiffer,

    #[error("failover_timeout_seconds must be >= 1")]
    InvalidFailoverTimeout,

    #[error("stability_window must be >= 1")]
    InvalidStabilityWindow,

    #[error("destination target_url must be a valid url: {0:?}")]
    InvalidTargetUrl(String),

    #[error("media filename must not contain path separators or '..': {0:?}")]
    UnsafeFilename(String),

    #[error("{field} is required")]
    MissingField { field: &'static str },
}
