use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProgramError>;

/// Error taxonomy for every engine operation.
///
/// Driver-specific failures are translated into these variants by the store
/// implementation, so nothing above the `RecordStore` port inspects driver
/// error strings.
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("invalid filter value: {0}")]
    InvalidFilterValue(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("no updatable fields supplied")]
    NoUpdatableFields,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("uniqueness conflict: {0}")]
    UniquenessConflict(String),

    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Stable machine-readable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidFilterValue,
    InvalidPayload,
    NoUpdatableFields,
    NotFound,
    UniquenessConflict,
    ForeignKeyViolation,
    StoreUnavailable,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidFilterValue => "invalid_filter_value",
            Self::InvalidPayload => "invalid_payload",
            Self::NoUpdatableFields => "no_updatable_fields",
            Self::NotFound => "not_found",
            Self::UniquenessConflict => "uniqueness_conflict",
            Self::ForeignKeyViolation => "foreign_key_violation",
            Self::StoreUnavailable => "store_unavailable",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ProgramError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFilterValue(_) => ErrorKind::InvalidFilterValue,
            Self::InvalidPayload(_) => ErrorKind::InvalidPayload,
            Self::NoUpdatableFields => ErrorKind::NoUpdatableFields,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::UniquenessConflict(_) => ErrorKind::UniquenessConflict,
            Self::ForeignKeyViolation(_) => ErrorKind::ForeignKeyViolation,
            Self::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidFilterValue(_)
            | Self::InvalidPayload(_)
            | Self::NoUpdatableFields
            | Self::ForeignKeyViolation(_) => 400,
            Self::NotFound(_) => 404,
            Self::UniquenessConflict(_) => 409,
            Self::StoreUnavailable(_) | Self::Internal(_) => 500,
            Self::Timeout(_) => 504,
        }
    }

    /// Whether a caller may retry the same request with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Timeout(_))
    }

    /// Message safe to hand to an external caller. Internal error chains
    /// stay in server logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }

    pub(crate) fn internal(message: impl std::fmt::Display) -> Self {
        Self::Internal(anyhow::anyhow!("{message}"))
    }
}
