//! Core error types.

use thiserror::Error;

/// Control plane errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Record not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Object storage error.
    #[error("object storage error: {0}")]
    Storage(#[from] object_store::Error),

    /// Kubernetes API error.
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Invalid caller input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing or rejected credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Uniqueness violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An error wrapped with a contextual message.
    #[error("{context}: {source}")]
    Context {
        /// What was being attempted.
        context: String,
        /// The underlying cause.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] naming the missing record.
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    /// Whether this error, or the error it wraps, is a not-found sentinel.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Context { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// The innermost error beneath any context wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("record".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Error::Conflict(db.message().to_string())
            }
            other => Error::Database(other),
        }
    }
}

/// Attach a contextual message to an error while propagating it.
pub trait Context<T> {
    /// Wrap the error with a fixed message.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Wrap the error with a lazily built message.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> Context<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Context {
            context: context.into(),
            source: Box::new(e.into()),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| Error::Context {
            context: f().into(),
            source: Box::new(e.into()),
        })
    }
}

/// Result alias for control plane operations.
pub type Result<T> = std::result::Result<T, Error>;
