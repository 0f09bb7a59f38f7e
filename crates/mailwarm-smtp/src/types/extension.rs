//! ESMTP extensions advertised in the EHLO reply.

/// SASL mechanism names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN (RFC 4616).
    Plain,
    /// LOGIN (obsolete, still widely deployed).
    Login,
    /// Anything else.
    Other(String),
}

impl AuthMechanism {
    /// Returns the mechanism name as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::Other(name) => name,
        }
    }

    fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "PLAIN" => Self::Plain,
            "LOGIN" => Self::Login,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A single EHLO keyword line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS (RFC 3207).
    StartTls,
    /// AUTH with the supported mechanisms.
    Auth(Vec<AuthMechanism>),
    /// SIZE with optional maximum message size.
    Size(Option<usize>),
    /// 8BITMIME (RFC 6152).
    EightBitMime,
    /// SMTPUTF8 (RFC 6531).
    SmtpUtf8,
    /// Unrecognised keyword, kept verbatim.
    Other(String),
}

impl Extension {
    /// Parses one EHLO line (without the reply code prefix).
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let keyword = parts.next().unwrap_or_default().to_ascii_uppercase();

        match keyword.as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(parts.map(AuthMechanism::parse).collect()),
            "SIZE" => Self::Size(parts.next().and_then(|n| n.parse().ok())),
            "8BITMIME" => Self::EightBitMime,
            "SMTPUTF8" => Self::SmtpUtf8,
            _ => Self::Other(line.trim().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_keywords() {
        assert_eq!(Extension::parse("STARTTLS"), Extension::StartTls);
        assert_eq!(Extension::parse("8BITMIME"), Extension::EightBitMime);
        assert_eq!(Extension::parse("SIZE 35882577"), Extension::Size(Some(35_882_577)));
        assert_eq!(Extension::parse("SIZE"), Extension::Size(None));
    }

    #[test]
    fn parses_auth_mechanisms() {
        assert_eq!(
            Extension::parse("AUTH PLAIN login XOAUTH2"),
            Extension::Auth(vec![
                AuthMechanism::Plain,
                AuthMechanism::Login,
                AuthMechanism::Other("XOAUTH2".to_string()),
            ])
        );
    }

    #[test]
    fn keeps_unknown_verbatim() {
        assert_eq!(
            Extension::parse("CHUNKING"),
            Extension::Other("CHUNKING".to_string())
        );
    }
}
