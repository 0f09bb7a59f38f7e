//! Envelope addresses.

use crate::error::{Error, Result};

/// Bare email address used in `MAIL FROM` / `RCPT TO`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates an address, validating its basic shape.
    ///
    /// Accepts a display form such as `"Jane <jane@example.com>"` and keeps
    /// only the angle-bracketed part.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is empty or not of the form
    /// `local@domain`.
    pub fn new(addr: impl AsRef<str>) -> Result<Self> {
        let addr = strip_display_name(addr.as_ref().trim());

        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }
        if addr.chars().any(|c| c.is_whitespace() || c == '<' || c == '>') {
            return Err(Error::InvalidAddress(format!(
                "Address contains invalid characters: {addr}"
            )));
        }

        match addr.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(Self(addr.to_string()))
            }
            _ => Err(Error::InvalidAddress(format!(
                "Address must be local@domain: {addr}"
            ))),
        }
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the domain part.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, d)| d)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn strip_display_name(addr: &str) -> &str {
    match (addr.rfind('<'), addr.rfind('>')) {
        (Some(open), Some(close)) if open < close => addr[open + 1..close].trim(),
        _ => addr,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn plain_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.domain(), "example.com");
    }

    #[test]
    fn display_form_is_unwrapped() {
        let addr = Address::new("Jane Doe <jane@example.org>").unwrap();
        assert_eq!(addr.as_str(), "jane@example.org");
    }

    #[test]
    fn rejects_malformed() {
        assert!(Address::new("").is_err());
        assert!(Address::new("no-at-sign").is_err());
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("user@").is_err());
        assert!(Address::new("a@b@c").is_err());
        assert!(Address::new("has space@example.com").is_err());
    }
}
