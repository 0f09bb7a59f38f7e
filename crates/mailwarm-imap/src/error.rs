//! IMAP client errors.

use thiserror::Error;

/// Failure of an IMAP round trip.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket read or write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS negotiation failed.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Host name is not usable as a TLS server name.
    #[error("invalid server name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Tagged `NO`.
    #[error("server said NO: {0}")]
    No(String),

    /// Tagged `BAD`.
    #[error("server said BAD: {0}")]
    Bad(String),

    /// Untagged `BYE`; the server is closing the connection.
    #[error("server closed the session: {0}")]
    Bye(String),

    /// Operation not allowed on this connection.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Reply could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// True for a tagged `NO` or `BAD`: the session is still usable.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::No(_) | Self::Bad(_))
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
