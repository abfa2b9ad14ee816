use serde::ser::SerializeStruct;
use thiserror::Error;

/// Coarse classification of a conversion gateway failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionErrorKind {
    BadInput,
    Timeout,
    Internal,
}

impl ConversionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadInput => "bad_input",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("operation not allowed: {0}")]
    StateConflict(String),
    #[error("conversion failed ({}): {message}", kind.as_str())]
    Conversion {
        kind: ConversionErrorKind,
        message: String,
    },
    #[error("stamping failed: {0}")]
    Stamping(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("storage write failed: {0}")]
    StorageWrite(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AppError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::StateConflict(_) => "STATE_CONFLICT",
            Self::Conversion { .. } => "CONVERSION_FAILURE",
            Self::Stamping(_) => "STAMPING_FAILURE",
            Self::Storage(_) | Self::StorageWrite(_) => "STORAGE_FAILURE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Only transient read-side storage failures are worth retrying.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    pub fn conversion(kind: ConversionErrorKind, message: impl Into<String>) -> Self {
        Self::Conversion {
            kind,
            message: message.into(),
        }
    }

    pub fn conversion_kind(&self) -> Option<ConversionErrorKind> {
        match self {
            Self::Conversion { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Human readable reason surfaced to the UI layer and recorded in `lastError`.
    pub fn user_message(&self) -> String {
        match self {
            Self::Conversion {
                kind: ConversionErrorKind::BadInput,
                ..
            } => "The document could not be converted. Please check that it is a valid .docx file.".to_string(),
            Self::Conversion {
                kind: ConversionErrorKind::Timeout,
                ..
            } => "The conversion took too long and was cancelled. Please try again.".to_string(),
            Self::Conversion { message, .. } => format!("The conversion service failed: {message}"),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::StorageWrite(value.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(value: sqlx::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(value: sqlx::migrate::MigrateError) -> Self {
        Self::StorageWrite(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Validation(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
