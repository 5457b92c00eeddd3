//! Error taxonomy for the sync engine.
//!
//! DESIGN
//! ======
//! Remote failures split into network errors (the call never landed) and
//! not-found errors (a concurrent deletion won the race). Validation errors
//! cover content that does not match the note's declared kind. Silent
//! last-write-wins overwrites are observable but are not errors, so they have
//! no variant here.

use crate::note::NoteId;

/// Grepable error code and retryable flag for notices and logs.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    #[error("{op} failed: {message}")]
    Network { op: &'static str, message: String },
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },
    #[error("invalid note: {0}")]
    Validation(String),
    #[error("unknown note: {0}")]
    UnknownNote(NoteId),
}

impl SyncError {
    #[must_use]
    pub fn network(op: &'static str, message: impl Into<String>) -> Self {
        Self::Network { op, message: message.into() }
    }

    #[must_use]
    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { what, id: id.into() }
    }
}

impl ErrorCode for SyncError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Network { .. } => "E_NETWORK",
            Self::NotFound { .. } => "E_NOT_FOUND",
            Self::Validation(_) => "E_VALIDATION",
            Self::UnknownNote(_) => "E_UNKNOWN_NOTE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
