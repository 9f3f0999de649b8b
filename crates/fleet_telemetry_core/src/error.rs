/// Failures a handler reports back to its caller.
///
/// Each variant maps to exactly one HTTP status; the message is returned to
/// the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),

    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed(_) => 405,
            Self::Internal(_) => 500,
        }
    }
}

/// Errors returned by telemetry and client storage backends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("van {van_id} is registered to a different clientID")]
    ClientMismatch { van_id: String },

    #[error("{0}")]
    Backend(String),
}

impl From<StoreError> for HandlerError {
    fn from(error: StoreError) -> Self {
        match error {
            mismatch @ StoreError::ClientMismatch { .. } => Self::Validation(mismatch.to_string()),
            StoreError::Backend(message) => Self::Internal(message),
        }
    }
}
