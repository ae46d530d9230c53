use thiserror::Error;

/// Service-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] dmda_core::ValidationError),

    #[error(transparent)]
    Core(#[from] dmda_core::CoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("server error: {0}")]
    Server(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) | Self::Config(_) => 2,
            Self::Core(_) => 3,
            Self::Server(_) | Self::Io(_) => 10,
        }
    }
}
