use std::fmt::Display;
use thiserror::Error;

/// Rejected input. The session is left untouched and nothing is recorded
/// as `last_error`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("message is empty")]
    EmptyInput,

    #[error("a reply is still being generated")]
    SubmissionInFlight,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Failed to save {what}: {message}")]
    StoreWrite { what: &'static str, message: String },

    #[error("Failed to load {what}: {message}")]
    StoreRead { what: &'static str, message: String },

    #[error("Failed to start reply: {0}")]
    StreamOpen(String),

    #[error("Reply interrupted: {0}")]
    StreamTransport(String),

    #[error("Invalid submission: {0}")]
    Validation(#[from] ValidationFailure),

    /// Messages were removed but the conversation record survived
    #[error("Conversation {conversation_id} was emptied but not deleted: {message}")]
    PartialDelete {
        conversation_id: String,
        message: String,
    },
}

impl SessionError {
    pub(crate) fn store_write(what: &'static str, err: impl Display) -> Self {
        Self::StoreWrite { what, message: err.to_string() }
    }

    pub(crate) fn store_read(what: &'static str, err: impl Display) -> Self {
        Self::StoreRead { what, message: err.to_string() }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether repeating the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        !self.is_validation()
    }
}
