// src/error.rs

use thiserror::Error;

use crate::backend::ObjectId;

/// Failures raised inside a repository backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown reference: {0}")]
    UnknownReference(String),

    #[error("object not found: {0}")]
    MissingObject(ObjectId),

    #[error("repository handle already closed")]
    Closed,
}

/// Unrecoverable failure to complete a requested traversal
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("could not open repository: {0}")]
    Open(#[source] BackendError),

    #[error("could not close repository: {0}")]
    Close(#[source] BackendError),

    #[error("{context}: {source}")]
    Backend {
        context: String,
        #[source]
        source: BackendError,
    },
}

impl RetrievalError {
    pub fn backend(context: impl Into<String>, source: BackendError) -> Self {
        RetrievalError::Backend {
            context: context.into(),
            source,
        }
    }
}

/// Content that cannot be decoded as text
#[derive(Error, Debug)]
pub enum DiffError {
    #[error("{side} content is not valid UTF-8: {source}")]
    InvalidUtf8 {
        side: &'static str,
        #[source]
        source: std::str::Utf8Error,
    },
}

/// Attaches operation context to backend results
pub(crate) trait ResultExt<T> {
    fn retrieval_context<C, F>(self, context: F) -> Result<T, RetrievalError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> ResultExt<T> for Result<T, BackendError> {
    fn retrieval_context<C, F>(self, context: F) -> Result<T, RetrievalError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| RetrievalError::backend(context(), e))
    }
}
