//! Domain model: inboxes under warm-up, their peers and the activity logs.

mod inbox;
mod log;
mod peer;

pub use inbox::{ImapConfig, Inbox, InboxId, InboxUpdate, NewInbox, Security, SmtpConfig};
pub use log::{NewSendLog, ReadAction, ReadEvent, SendLogEntry};
pub use peer::Peer;
