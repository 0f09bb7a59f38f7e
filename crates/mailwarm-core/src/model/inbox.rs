//! Inbox model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque inbox identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InboxId(String);

impl InboxId {
    /// Generates a fresh identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for InboxId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for InboxId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for InboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Security/encryption mode for connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// No encryption.
    None,
    /// Implicit TLS (connect directly with TLS).
    #[default]
    Tls,
    /// STARTTLS upgrade after plaintext connect.
    StartTls,
}

impl Security {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Tls => "tls",
            Self::StartTls => "starttls",
        }
    }

    /// Parses the storage representation; unknown values fall back to TLS.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "none" => Self::None,
            "starttls" => Self::StartTls,
            _ => Self::Tls,
        }
    }
}

/// Outbound (SMTP submission) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// Server hostname.
    pub host: String,
    /// Server port; 0 means the default for `security`.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Login, also used as the sender address.
    pub username: String,
    /// Password.
    #[serde(skip_serializing)]
    pub password: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 0,
            security: Security::StartTls,
            username: String::new(),
            password: String::new(),
        }
    }
}

impl SmtpConfig {
    /// Default port for the security mode.
    #[must_use]
    pub const fn default_port(security: Security) -> u16 {
        match security {
            Security::Tls => 465,
            Security::StartTls => 587,
            Security::None => 25,
        }
    }

    /// Configured port, or the default for the security mode.
    #[must_use]
    pub const fn effective_port(&self) -> u16 {
        if self.port == 0 {
            Self::default_port(self.security)
        } else {
            self.port
        }
    }
}

/// Inbound (IMAP) settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImapConfig {
    /// Server hostname.
    pub host: String,
    /// Server port; 0 means the default for `security`.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Login.
    pub username: String,
    /// Password.
    #[serde(skip_serializing)]
    pub password: String,
}

impl ImapConfig {
    /// Default port for the security mode.
    #[must_use]
    pub const fn default_port(security: Security) -> u16 {
        match security {
            Security::Tls => 993,
            Security::StartTls | Security::None => 143,
        }
    }

    /// Configured port, or the default for the security mode.
    #[must_use]
    pub const fn effective_port(&self) -> u16 {
        if self.port == 0 {
            Self::default_port(self.security)
        } else {
            self.port
        }
    }

    /// True when host, username and password are all set.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.host.trim().is_empty() && !self.username.is_empty() && !self.password.is_empty()
    }
}

/// An email account under warm-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbox {
    /// Identifier.
    pub id: InboxId,
    /// Unique display label.
    pub label: String,
    /// Provider tag; only `smtp` is used today.
    pub provider: String,
    /// Sends intended per day. Values below 1 are treated as 1 when planning.
    pub daily_target: i64,
    /// Whether the scheduler processes this inbox.
    pub active: bool,
    /// Outbound settings.
    pub smtp: SmtpConfig,
    /// Inbound settings.
    pub imap: ImapConfig,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Inbox {
    /// Address used as `From` and SMTP envelope sender.
    #[must_use]
    pub fn sender_address(&self) -> &str {
        &self.smtp.username
    }
}

/// Fields for creating an inbox.
#[derive(Debug, Clone, Deserialize)]
pub struct NewInbox {
    /// Unique display label.
    pub label: String,
    /// Provider tag.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Sends intended per day.
    #[serde(default = "default_daily_target")]
    pub daily_target: i64,
    /// Whether the inbox starts active.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Outbound settings.
    #[serde(default)]
    pub smtp: SmtpConfig,
    /// Inbound settings.
    #[serde(default)]
    pub imap: ImapConfig,
}

impl NewInbox {
    /// Creates a request with defaults for everything but the label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            provider: default_provider(),
            daily_target: default_daily_target(),
            active: default_active(),
            smtp: SmtpConfig::default(),
            imap: ImapConfig::default(),
        }
    }
}

fn default_provider() -> String {
    "smtp".to_string()
}

const fn default_daily_target() -> i64 {
    20
}

const fn default_active() -> bool {
    true
}

/// Partial update of an inbox.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboxUpdate {
    /// New label.
    pub label: Option<String>,
    /// New daily target.
    pub daily_target: Option<i64>,
    /// New active flag.
    pub active: Option<bool>,
}

impl InboxUpdate {
    /// True when nothing would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.label.is_none() && self.daily_target.is_none() && self.active.is_none()
    }
}
