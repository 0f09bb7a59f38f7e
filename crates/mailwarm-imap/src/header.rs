//! Parsing of fetched RFC 5322 header blocks.

use base64::Engine;

/// Header fields of a message, in the order they appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    fields: Vec<(String, String)>,
}

impl HeaderFields {
    /// Parses a raw header block, unfolding continuation lines and decoding
    /// RFC 2047 encoded words.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        let mut fields: Vec<(String, String)> = Vec::new();

        for line in text.lines() {
            if line.trim().is_empty() {
                break;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = fields.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                fields.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
            }
        }

        for (_, value) in &mut fields {
            *value = decode_encoded_words(value);
        }

        Self { fields }
    }

    /// Returns the first value of a header (case-insensitive name).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first non-empty value of a header.
    #[must_use]
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }
}

/// Decodes `=?charset?B|Q?text?=` words. Only UTF-8 and ASCII-compatible
/// charsets are decoded; anything undecodable is kept verbatim.
#[must_use]
pub fn decode_encoded_words(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    let mut last_was_encoded = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        let Some((decoded, consumed)) = decode_word(candidate) else {
            out.push_str(before);
            out.push_str("=?");
            rest = &candidate[2..];
            last_was_encoded = false;
            continue;
        };

        // Whitespace between adjacent encoded words is not significant.
        if !(last_was_encoded && before.trim().is_empty()) {
            out.push_str(before);
        }
        out.push_str(&decoded);
        rest = &candidate[consumed..];
        last_was_encoded = true;
    }

    out.push_str(rest);
    out
}

/// Decodes one encoded word at the start of `s`, returning the text and the
/// number of bytes consumed.
fn decode_word(s: &str) -> Option<(String, usize)> {
    let body = s.strip_prefix("=?")?;
    let mut parts = body.splitn(3, '?');
    let charset = parts.next()?;
    let encoding = parts.next()?;
    let tail = parts.next()?;
    let end = tail.find("?=")?;
    let text = &tail[..end];

    if !is_supported_charset(charset) {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => base64::engine::general_purpose::STANDARD
            .decode(text.trim())
            .ok()?,
        "Q" | "q" => decode_q(text)?,
        _ => return None,
    };

    let consumed = 2 + charset.len() + 1 + encoding.len() + 1 + end + 2;
    Some((String::from_utf8_lossy(&bytes).into_owned(), consumed))
}

fn is_supported_charset(charset: &str) -> bool {
    let charset = charset.split('*').next().unwrap_or_default();
    ["utf-8", "utf8", "us-ascii", "iso-8859-1"]
        .iter()
        .any(|c| c.eq_ignore_ascii_case(charset))
}

fn decode_q(text: &str) -> Option<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => out.push(b' '),
            b'=' => {
                let hex = text.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_unfolds() {
        let raw = b"From: Peer One <peer@example.org>\r\nSubject: Quick\r\n check-in\r\n\r\n";
        let headers = HeaderFields::parse(raw);
        assert_eq!(headers.get("from"), Some("Peer One <peer@example.org>"));
        assert_eq!(headers.get("SUBJECT"), Some("Quick check-in"));
        assert_eq!(headers.get("reply-to"), None);
    }

    #[test]
    fn empty_values_are_filtered_by_get_non_empty() {
        let headers = HeaderFields::parse(b"Reply-To:\r\nFrom: a@b.c\r\n");
        assert_eq!(headers.get("reply-to"), Some(""));
        assert_eq!(headers.get_non_empty("reply-to"), None);
    }

    #[test]
    fn decodes_base64_word() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?SGVsbG8gd29ybGQ=?="), "Hello world");
    }

    #[test]
    fn decodes_q_word_and_joins_adjacent() {
        assert_eq!(
            decode_encoded_words("=?utf-8?Q?Caf=C3=A9?= =?utf-8?Q?_time?="),
            "Café time"
        );
    }

    #[test]
    fn keeps_plain_and_malformed_text() {
        assert_eq!(decode_encoded_words("Re: earlier"), "Re: earlier");
        assert_eq!(decode_encoded_words("odd =? text"), "odd =? text");
        assert_eq!(
            decode_encoded_words("=?koi8-r?B?AAAA?="),
            "=?koi8-r?B?AAAA?="
        );
    }
}
