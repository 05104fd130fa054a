use thiserror::Error;

/// Errors surfaced by engine operations. All variants except `Store` are
/// caller-correctable: bad input, an illegal state transition, or a dangling
/// reference. `Store` wraps backend failures from the persistence layer.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(String),
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => EngineError::NotFound("record not found".to_string()),
            other => EngineError::Store(other.to_string()),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
