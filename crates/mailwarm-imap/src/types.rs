//! Core IMAP types.

use std::fmt;

/// Message unique identifier within a mailbox (RFC 3501 §2.3.1.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uid(u32);

impl Uid {
    /// Creates a UID. Zero is not a valid UID.
    #[must_use]
    pub const fn new(value: u32) -> Option<Self> {
        if value == 0 { None } else { Some(Self(value)) }
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// System flags the client sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// `\Seen`
    Seen,
    /// `\Flagged` (starred)
    Flagged,
    /// `\Answered`
    Answered,
}

impl Flag {
    /// Returns the wire form of the flag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seen => "\\Seen",
            Self::Flagged => "\\Flagged",
            Self::Answered => "\\Answered",
        }
    }
}

/// Envelope headers of one message, fetched without marking it seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeaders {
    /// Message UID.
    pub uid: Uid,
    /// Raw (decoded) `From` header value.
    pub from: String,
    /// Raw (decoded) `Reply-To` header value, if present.
    pub reply_to: Option<String>,
    /// Decoded `Subject`, empty when absent.
    pub subject: String,
    /// `Message-ID` header, if present.
    pub message_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_rejects_zero() {
        assert!(Uid::new(0).is_none());
        assert_eq!(Uid::new(7).map(Uid::get), Some(7));
    }

    #[test]
    fn flag_wire_form() {
        assert_eq!(Flag::Seen.as_str(), "\\Seen");
        assert_eq!(Flag::Flagged.as_str(), "\\Flagged");
    }
}
