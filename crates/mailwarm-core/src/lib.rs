//! # mailwarm-core
//!
//! Warm-up logic for the mailwarm service.
//!
//! This crate provides:
//! - Domain models for inboxes, peers and activity logs
//! - Daily send plans and catch-up scheduling
//! - Weighted peer selection and message composition
//! - SMTP/IMAP transports behind swappable traits
//! - `SQLite` storage with versioned migrations

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod model;
pub mod storage;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;
pub mod warmup;

pub use error::{Error, Result};
pub use model::{
    ImapConfig, Inbox, InboxId, InboxUpdate, NewInbox, NewSendLog, Peer, ReadAction, ReadEvent,
    Security, SendLogEntry, SmtpConfig,
};
pub use storage::{SqliteStore, WarmupStore};
pub use transport::{
    ImapTransport, InboundMessage, InboundTransport, OutboundTransport, SmtpTransport,
    TransportError, TransportErrorKind,
};
pub use warmup::{InboxOutcome, Orchestrator, TickReport, WarmupSettings};
