#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A required field is missing or malformed. The message names the field.
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("cannot change appointment status from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("only the authoring doctor may change this {0}")]
    NotOwner(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("failed to run migration v{version}: {reason}")]
    Migration { version: i64, reason: String },
    #[error("failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True when the error is a SQLite constraint violation (unique, check or foreign key).
    pub(crate) fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            CoreError::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Raised when a stored or supplied tag does not name a known variant.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
