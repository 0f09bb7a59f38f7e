//! Mail transport interfaces and their SMTP/IMAP implementations.
//!
//! The warm-up pipeline only talks to [`OutboundTransport`] and
//! [`InboundTransport`]; credentials travel inside the [`Inbox`] and are
//! opaque to everything but the adapters.

mod imap;
mod smtp;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

pub use self::imap::ImapTransport;
pub use self::smtp::{SmtpTransport, render_message};
use crate::model::Inbox;

/// Broad classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Could not reach or negotiate with the server.
    Connect,
    /// Credentials refused.
    Auth,
    /// Server refused the command or message.
    Rejected,
    /// Unexpected server behaviour.
    Protocol,
    /// Operation exceeded the I/O timeout.
    Timeout,
    /// Inbox settings are unusable.
    Configuration,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connection failed",
            Self::Auth => "authentication failed",
            Self::Rejected => "rejected",
            Self::Protocol => "protocol error",
            Self::Timeout => "timed out",
            Self::Configuration => "misconfigured",
        })
    }
}

/// A single send or poll operation failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct TransportError {
    /// Classification.
    pub kind: TransportErrorKind,
    /// Server or library detail.
    pub detail: String,
}

impl TransportError {
    /// Creates an error.
    #[must_use]
    pub fn new(kind: TransportErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub(crate) fn timeout(operation: &str) -> Self {
        Self::new(TransportErrorKind::Timeout, operation)
    }
}

/// An unseen message as seen by the inbound processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Transport-specific message identifier (the IMAP UID).
    pub id: String,
    /// Raw `From` header.
    pub from: String,
    /// Decoded subject.
    pub subject: String,
    /// Address replies go to: `Reply-To` if present, else `From`.
    pub reply_to: String,
    /// `Message-ID` header, when the message carries one.
    pub message_id: Option<String>,
}

impl InboundMessage {
    /// Stable key for engagement events: the `Message-ID` when present,
    /// else the transport id.
    #[must_use]
    pub fn event_key(&self) -> &str {
        self.message_id.as_deref().unwrap_or(&self.id)
    }
}

/// Delivers one message on behalf of an inbox.
#[async_trait]
pub trait OutboundTransport: Send + Sync {
    /// Sends a plain-text message and returns its Message-ID. Not idempotent.
    async fn send(
        &self,
        inbox: &Inbox,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, TransportError>;
}

/// Reads and updates an inbox's primary folder.
#[async_trait]
pub trait InboundTransport: Send + Sync {
    /// Lists unseen messages without marking them seen.
    async fn fetch_unseen(&self, inbox: &Inbox) -> Result<Vec<InboundMessage>, TransportError>;

    /// Marks a message seen. Marking twice is harmless.
    async fn mark_seen(&self, inbox: &Inbox, id: &str) -> Result<(), TransportError>;

    /// Flags (stars) a message.
    async fn flag(&self, inbox: &Inbox, id: &str) -> Result<(), TransportError>;

    /// Called once the processor is done with the inbox for this pass.
    async fn finish(&self, _inbox: &Inbox) {}
}
