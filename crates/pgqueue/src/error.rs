/// Error taxonomy for the Queue API.
///
/// `NotFound` is deliberately absent: `get`/`claim` express "nothing here" as
/// `Ok(None)`, not an error, since it's an expected outcome rather than a
/// failure of the operation.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("store error (transient): {0}")]
    Transient(#[source] sqlx::Error),

    #[error("store error (fatal): {0}")]
    Fatal(#[source] sqlx::Error),
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => QueueError::Transient(err),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // serialization_failure, deadlock_detected, lock_not_available
                Some("40001") | Some("40P01") | Some("55P03") => QueueError::Transient(err),
                _ => QueueError::Fatal(err),
            },
            _ => QueueError::Fatal(err),
        }
    }
}

pub type QueueResult<T> = Result<T, QueueError>;

/// The outcome of running a handler against one job.
#[derive(Debug, Clone)]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for HandlerError {}
