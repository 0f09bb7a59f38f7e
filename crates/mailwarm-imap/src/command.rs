//! IMAP command serialization and tagging.

use crate::types::{Flag, Uid};

/// Header fields requested for unseen messages.
pub const HEADER_FIELDS: &[&str] = &["FROM", "REPLY-TO", "SUBJECT", "MESSAGE-ID"];

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// STARTTLS
    StartTls,
    /// LOGIN user password
    Login {
        /// Username
        username: String,
        /// Password
        password: String,
    },
    /// SELECT mailbox
    Select {
        /// Mailbox name
        mailbox: String,
    },
    /// UID SEARCH criteria (criteria is passed through verbatim)
    UidSearch {
        /// Search criteria, e.g. `UNSEEN`
        criteria: String,
    },
    /// UID FETCH set BODY.PEEK[HEADER.FIELDS (...)] with UID
    UidFetchHeaders {
        /// Messages to fetch
        uids: Vec<Uid>,
    },
    /// UID STORE set +FLAGS.SILENT (...)
    UidAddFlags {
        /// Messages to update
        uids: Vec<Uid>,
        /// Flags to add
        flags: Vec<Flag>,
    },
    /// LOGOUT
    Logout,
}

impl Command {
    /// Serializes the command with the given tag, including CRLF.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');

        match self {
            Self::StartTls => buf.extend_from_slice(b"STARTTLS"),
            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }
            Self::Select { mailbox } => {
                buf.extend_from_slice(b"SELECT ");
                write_astring(&mut buf, mailbox);
            }
            Self::UidSearch { criteria } => {
                buf.extend_from_slice(b"UID SEARCH ");
                buf.extend_from_slice(criteria.as_bytes());
            }
            Self::UidFetchHeaders { uids } => {
                buf.extend_from_slice(b"UID FETCH ");
                write_uid_set(&mut buf, uids);
                buf.extend_from_slice(b" (UID BODY.PEEK[HEADER.FIELDS (");
                buf.extend_from_slice(HEADER_FIELDS.join(" ").as_bytes());
                buf.extend_from_slice(b")])");
            }
            Self::UidAddFlags { uids, flags } => {
                buf.extend_from_slice(b"UID STORE ");
                write_uid_set(&mut buf, uids);
                buf.extend_from_slice(b" +FLAGS.SILENT (");
                let names: Vec<&str> = flags.iter().map(|f| f.as_str()).collect();
                buf.extend_from_slice(names.join(" ").as_bytes());
                buf.push(b')');
            }
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Returns true if the command carries credentials and must not be logged.
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        matches!(self, Self::Login { .. })
    }
}

/// Writes an astring (atom or quoted string).
fn write_astring(buf: &mut Vec<u8>, s: &str) {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        buf.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                buf.push(b'\\');
            }
            buf.push(b);
        }
        buf.push(b'"');
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']'
    ) || b < 0x20
        || b >= 0x7F
}

/// Writes a comma-separated UID set, collapsing consecutive runs.
fn write_uid_set(buf: &mut Vec<u8>, uids: &[Uid]) {
    let mut sorted: Vec<u32> = uids.iter().map(|u| u.get()).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut parts: Vec<String> = Vec::new();
    let mut iter = sorted.into_iter().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}:{end}"));
        }
    }
    buf.extend_from_slice(parts.join(",").as_bytes());
}

/// Tag generator for IMAP commands (`A0001`, `A0002`, ...).
#[derive(Debug, Clone)]
pub struct TagGenerator {
    counter: u32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { counter: 0, prefix }
    }

    /// Generates the next tag.
    pub fn next_tag(&mut self) -> String {
        self.counter = self.counter.wrapping_add(1);
        format!("{}{:04}", self.prefix, self.counter)
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn uids(values: &[u32]) -> Vec<Uid> {
        values.iter().map(|v| Uid::new(*v).unwrap()).collect()
    }

    #[test]
    fn login_quotes_when_needed() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "p a\"ss".to_string(),
        };
        assert_eq!(
            cmd.serialize("A0001"),
            b"A0001 LOGIN user@example.com \"p a\\\"ss\"\r\n"
        );
        assert!(cmd.is_sensitive());
    }

    #[test]
    fn fetch_headers_uses_peek() {
        let cmd = Command::UidFetchHeaders {
            uids: uids(&[3, 1, 2, 7]),
        };
        assert_eq!(
            String::from_utf8(cmd.serialize("A0002")).unwrap(),
            "A0002 UID FETCH 1:3,7 (UID BODY.PEEK[HEADER.FIELDS (FROM REPLY-TO SUBJECT MESSAGE-ID)])\r\n"
        );
    }

    #[test]
    fn store_adds_flags_silently() {
        let cmd = Command::UidAddFlags {
            uids: uids(&[42]),
            flags: vec![Flag::Seen, Flag::Flagged],
        };
        assert_eq!(
            cmd.serialize("A0003"),
            b"A0003 UID STORE 42 +FLAGS.SILENT (\\Seen \\Flagged)\r\n"
        );
    }

    #[test]
    fn tags_are_sequential() {
        let mut tags = TagGenerator::default();
        assert_eq!(tags.next_tag(), "A0001");
        assert_eq!(tags.next_tag(), "A0002");
    }
}
