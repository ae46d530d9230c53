use thiserror::Error;

/// Configuration and contract errors exposed by `dmda-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("table name cannot be empty")]
    EmptyTable,
    #[error("table name '{value}' contains invalid character '{ch}'")]
    InvalidTableChar { value: String, ch: char },
    #[error("query must select at least one column")]
    EmptyProjection,
    #[error("unknown column '{value}'")]
    UnknownColumn { value: String },

    #[error("project id cannot be empty")]
    EmptyProjectId,
    #[error("page size must be greater than zero")]
    ZeroPageSize,
    #[error("request timeout must be greater than zero")]
    ZeroRequestTimeout,
}

/// Top-level error type for core operations outside a build.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
