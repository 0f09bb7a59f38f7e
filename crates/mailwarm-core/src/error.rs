//! Error types for the core library.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The inbox has no peers to send to.
    #[error("peer pool is empty")]
    EmptyPool,

    /// A send or poll against a mail server failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Database operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Inbox not found.
    #[error("inbox not found: {0}")]
    InboxNotFound(String),

    /// Peer not found.
    #[error("peer not found: {0}")]
    PeerNotFound(i64),

    /// Rejected input from the administration surface.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Returns true for lookups that found nothing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::InboxNotFound(_) | Self::PeerNotFound(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
