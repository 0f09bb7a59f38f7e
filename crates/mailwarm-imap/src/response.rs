//! Interpretation of server responses.
//!
//! Only the handful of response shapes this client asks for are understood:
//! tagged status lines, `* n EXISTS`, `* SEARCH` and header `FETCH` data.

use crate::header::HeaderFields;
use crate::types::{MessageHeaders, Uid};
use crate::{Error, Result};

/// One complete server response: its line text (CRLF stripped, literal
/// markers kept) and the literal payloads in the order they appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// Concatenated line text.
    pub text: String,
    /// Literal payloads.
    pub literals: Vec<Vec<u8>>,
}

impl Response {
    /// Creates a response with no literals.
    #[must_use]
    pub fn line(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            literals: Vec::new(),
        }
    }

    /// Returns true if this is the tagged completion for `tag`.
    #[must_use]
    pub fn is_tagged(&self, tag: &str) -> bool {
        self.text
            .strip_prefix(tag)
            .is_some_and(|rest| rest.starts_with(' '))
    }

    /// Returns the text after the `* ` prefix of an untagged response.
    #[must_use]
    pub fn untagged(&self) -> Option<&str> {
        self.text.strip_prefix("* ")
    }

    /// Returns the `BYE` text if this is an untagged BYE.
    #[must_use]
    pub fn bye_text(&self) -> Option<&str> {
        let rest = self.untagged()?;
        strip_keyword(rest, "BYE").map(str::trim)
    }
}

/// Checks the tagged completion for `tag` among `responses`.
///
/// # Errors
///
/// Returns `No`/`Bad`/`Bye` for those statuses and `Protocol` when the
/// completion is missing or malformed.
pub fn check_tagged_ok(responses: &[Response], tag: &str) -> Result<()> {
    let tagged = responses
        .iter()
        .rev()
        .find(|r| r.is_tagged(tag))
        .ok_or_else(|| Error::Protocol("missing tagged response".to_string()))?;

    let rest = tagged.text[tag.len()..].trim_start();
    let (status, text) = rest.split_once(' ').unwrap_or((rest, ""));
    let text = text.trim().to_string();

    match status.to_ascii_uppercase().as_str() {
        "OK" => Ok(()),
        "NO" => Err(Error::No(text)),
        "BAD" => Err(Error::Bad(text)),
        "BYE" => Err(Error::Bye(text)),
        other => Err(Error::Protocol(format!("unknown status {other}"))),
    }
}

/// Extracts the message count from `* n EXISTS`.
#[must_use]
pub fn parse_exists(responses: &[Response]) -> Option<u32> {
    responses.iter().filter_map(Response::untagged).find_map(|rest| {
        let (count, keyword) = rest.split_once(' ')?;
        if keyword.trim().eq_ignore_ascii_case("EXISTS") {
            count.parse().ok()
        } else {
            None
        }
    })
}

/// Collects UIDs from `* SEARCH` responses.
#[must_use]
pub fn parse_search(responses: &[Response]) -> Vec<Uid> {
    let mut uids: Vec<Uid> = responses
        .iter()
        .filter_map(Response::untagged)
        .filter_map(|rest| strip_keyword(rest, "SEARCH"))
        .flat_map(str::split_ascii_whitespace)
        .filter_map(|n| n.parse::<u32>().ok())
        .filter_map(Uid::new)
        .collect();
    uids.sort_unstable();
    uids.dedup();
    uids
}

/// Builds [`MessageHeaders`] from header `FETCH` responses.
///
/// Responses without a UID or a header literal are skipped.
#[must_use]
pub fn parse_fetch_headers(responses: &[Response]) -> Vec<MessageHeaders> {
    responses
        .iter()
        .filter_map(|response| {
            let rest = response.untagged()?;
            let (_, after_seq) = rest.split_once(' ')?;
            let data = strip_keyword(after_seq, "FETCH")?;
            let uid = find_uid(data)?;
            let raw = response.literals.first()?;
            Some(headers_from_block(uid, raw))
        })
        .collect()
}

fn headers_from_block(uid: Uid, raw: &[u8]) -> MessageHeaders {
    let fields = HeaderFields::parse(raw);
    MessageHeaders {
        uid,
        from: fields.get("from").unwrap_or_default().to_string(),
        reply_to: fields.get_non_empty("reply-to").map(str::to_string),
        subject: fields.get("subject").unwrap_or_default().to_string(),
        message_id: fields.get_non_empty("message-id").map(str::to_string),
    }
}

/// Finds the value following the `UID` item in FETCH data.
fn find_uid(data: &str) -> Option<Uid> {
    let mut tokens = data
        .split(|c: char| c.is_ascii_whitespace() || c == '(' || c == ')')
        .filter(|t| !t.is_empty());
    while let Some(token) = tokens.next() {
        if token.eq_ignore_ascii_case("UID") {
            return tokens.next()?.parse().ok().and_then(Uid::new);
        }
    }
    None
}

/// Strips a leading keyword (case-insensitive) followed by a space or end.
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let head = text.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &text[keyword.len()..];
    if rest.is_empty() || rest.starts_with(' ') {
        Some(rest.trim_start())
    } else {
        None
    }
}
