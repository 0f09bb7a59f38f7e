//! Append-only activity records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::InboxId;

/// A send attempt about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSendLog {
    /// Sending inbox.
    pub inbox_id: InboxId,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
    /// Message-ID assigned on success.
    pub provider_message_id: Option<String>,
    /// Whether the transport accepted the message.
    pub success: bool,
    /// Truncated failure text.
    pub error: Option<String>,
    /// Attempt time.
    pub sent_at: DateTime<Utc>,
}

/// A recorded send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendLogEntry {
    /// Row identifier.
    pub id: i64,
    /// Sending inbox; `None` once the inbox was deleted.
    pub inbox_id: Option<InboxId>,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
    /// Message-ID assigned on success.
    pub provider_message_id: Option<String>,
    /// Whether the transport accepted the message.
    pub success: bool,
    /// Truncated failure text.
    pub error: Option<String>,
    /// Attempt time.
    pub sent_at: DateTime<Utc>,
}

/// Engagement action taken on an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadAction {
    /// Marked `\Seen`.
    Opened,
    /// Flagged.
    Starred,
    /// Replied to.
    Replied,
}

impl ReadAction {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Starred => "starred",
            Self::Replied => "replied",
        }
    }

    /// Parses the storage representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "opened" => Some(Self::Opened),
            "starred" => Some(Self::Starred),
            "replied" => Some(Self::Replied),
            _ => None,
        }
    }
}

/// An observed engagement action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadEvent {
    /// Inbox the message arrived in.
    pub inbox_id: InboxId,
    /// `Message-ID` of the message, or its transport id when it has none.
    pub message_id: String,
    /// Action taken.
    pub action: ReadAction,
    /// When it happened.
    pub at: DateTime<Utc>,
}
