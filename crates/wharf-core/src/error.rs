//! Error types and result aliases for wharf.
//!
//! This module defines the shared error types used across all wharf components.
//! Errors are structured for programmatic handling and carry the offending
//! path or identifier for diagnosis.

/// The result type used throughout wharf.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in wharf operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configured path layout template is invalid.
    ///
    /// Fatal at client construction; never retried.
    #[error("invalid layout: {message}")]
    InvalidLayout {
        /// Description of what made the template invalid.
        message: String,
    },

    /// A catalog table directory has not been created yet.
    ///
    /// Signals that `initialize_storage` must run before catalog reads.
    #[error("storage not initialized: {dir}")]
    NotInitialized {
        /// The directory that was expected to exist.
        dir: String,
    },

    /// An object survived both the delete primitive and the fallback remove.
    ///
    /// An inconsistent deletion is worse than a loud failure, so this is
    /// escalated instead of swallowed.
    #[error("object still exists after delete: {path}")]
    DeleteIncomplete {
        /// The object that could not be removed.
        path: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// A path or object was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new invalid layout error.
    #[must_use]
    pub fn invalid_layout(message: impl Into<String>) -> Self {
        Self::InvalidLayout {
            message: message.into(),
        }
    }

    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns `true` if the error is a missing path or object.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}
