use std::{borrow::Cow, fmt};

use thiserror::Error;

use crate::types::Collection;

/// Error reported by a [`DocumentStore`](crate::store::DocumentStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed document does not exist in the store.
    #[error("document {collection}/{id} not found")]
    NotFound { collection: Collection, id: String },

    /// The store refused the query shape (missing index, unsortable field).
    #[error("failed precondition: {message}")]
    PreconditionFailed { message: Cow<'static, str> },

    /// The store call was rejected or the channel to it broke.
    #[error("transport failure: {message}")]
    Transport { message: Cow<'static, str> },

    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn transport(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Transport { message: message.into() }
    }

    pub fn precondition(message: impl Into<Cow<'static, str>>) -> Self {
        Self::PreconditionFailed { message: message.into() }
    }

    /// Whether this failure should trigger the unsorted fallback subscription.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }
}

/// Failure half of every mutating operation's result.
#[derive(Debug, Error)]
pub enum MutationError {
    /// Referenced entity is absent from the current snapshot (or the store).
    #[error("{collection} {id} not found")]
    NotFound { collection: Collection, id: String },

    /// The store call failed; the message is passed through from the store.
    #[error("{message}")]
    Transport { message: String },

    /// A multi-step mutation stopped half-way; the completed steps are not rolled back.
    #[error("partial mutation: {completed:?} applied, {failed} failed: {message}")]
    PartialMutation {
        completed: Vec<String>,
        failed: String,
        message: String,
    },

    /// Input rejected before any mutation was issued.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Input failed field validation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Media upload failed before a document could be written.
    #[error("upload failed: {0}")]
    Upload(#[from] BlobError),
}

impl MutationError {
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection,
            id: id.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest { message: message.into() }
    }

    /// Human-readable reason shown by the presentation layer.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

impl From<StoreError> for MutationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => Self::NotFound { collection, id },
            other => Self::Transport {
                message: other.to_string(),
            },
        }
    }
}

/// Error raised by a [`BlobStorage`](crate::blob::BlobStorage) backend.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid blob path '{path}'")]
    InvalidPath { path: String },
}

/// Collection of validation issues encountered while preparing a mutation.
#[derive(Debug, Error)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, issue) in self.issues.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", issue.field, issue.message)?;
        }
        Ok(())
    }
}

/// Detailed validation failure for a single field.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}
