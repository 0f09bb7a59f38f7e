//! SMTP submission adapter.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use mailwarm_smtp::connection::{connect, connect_tls};
use mailwarm_smtp::{Address, Client};
use tracing::debug;

use super::{OutboundTransport, TransportError, TransportErrorKind};
use crate::model::{Inbox, Security, SmtpConfig};

/// Sends warm-up mail through each inbox's own SMTP server.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    io_timeout: Duration,
}

impl SmtpTransport {
    /// Creates a transport whose whole session is bounded by `io_timeout`.
    #[must_use]
    pub const fn new(io_timeout: Duration) -> Self {
        Self { io_timeout }
    }
}

#[async_trait]
impl OutboundTransport for SmtpTransport {
    async fn send(
        &self,
        inbox: &Inbox,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, TransportError> {
        let from = Address::new(inbox.sender_address()).map_err(|e| {
            TransportError::new(TransportErrorKind::Configuration, e.to_string())
        })?;
        let recipient = Address::new(to)
            .map_err(|e| TransportError::new(TransportErrorKind::Rejected, e.to_string()))?;

        let message_id = format!("<{}@{}>", uuid::Uuid::new_v4(), from.domain());
        let message = render_message(
            from.as_str(),
            recipient.as_str(),
            subject,
            body,
            &message_id,
            Utc::now(),
        );

        tokio::time::timeout(
            self.io_timeout,
            deliver(&inbox.smtp, from, recipient, message.as_bytes()),
        )
        .await
        .map_err(|_| TransportError::timeout("SMTP session"))??;

        debug!(inbox = %inbox.id, to, %message_id, "message accepted");
        Ok(message_id)
    }
}

async fn deliver(
    config: &SmtpConfig,
    from: Address,
    to: Address,
    data: &[u8],
) -> Result<(), TransportError> {
    if config.host.trim().is_empty() {
        return Err(TransportError::new(
            TransportErrorKind::Configuration,
            "SMTP host is not set",
        ));
    }

    let port = config.effective_port();
    let stream = match config.security {
        Security::Tls => connect_tls(&config.host, port).await,
        Security::StartTls | Security::None => connect(&config.host, port).await,
    }
    .map_err(connect_error)?;

    let helo = from.domain().to_string();
    let client = Client::from_stream(stream).await.map_err(connect_error)?;
    let client = client.ehlo(&helo).await.map_err(connect_error)?;
    let client = if config.security == Security::StartTls {
        client.starttls(&config.host).await.map_err(connect_error)?
    } else {
        client
    };

    let envelope = if config.password.is_empty() {
        client.mail_from(from).await?
    } else {
        client
            .auth_plain(&config.username, &config.password)
            .await?
            .mail_from(from)
            .await?
    };

    let client = envelope.rcpt_to(to).await?.send_data(data).await?;

    // The message is already queued; a failed QUIT does not undo that.
    if let Err(e) = client.quit().await {
        debug!(error = %e, "QUIT failed after delivery");
    }
    Ok(())
}

fn connect_error(error: mailwarm_smtp::Error) -> TransportError {
    match error {
        mailwarm_smtp::Error::Rejected { .. } | mailwarm_smtp::Error::NotSupported(_) => {
            error.into()
        }
        other => TransportError::new(TransportErrorKind::Connect, other.to_string()),
    }
}

impl From<mailwarm_smtp::Error> for TransportError {
    fn from(error: mailwarm_smtp::Error) -> Self {
        use mailwarm_smtp::Error as E;

        let kind = match &error {
            E::Io(_) | E::Tls(_) => TransportErrorKind::Connect,
            E::Rejected { .. } if error.is_auth_failure() => TransportErrorKind::Auth,
            E::Rejected { .. } | E::InvalidAddress(_) => TransportErrorKind::Rejected,
            E::Protocol(_) => TransportErrorKind::Protocol,
            E::NotSupported(_) => TransportErrorKind::Configuration,
        };
        Self::new(kind, error.to_string())
    }
}

/// Renders a plain-text RFC 5322 message.
#[must_use]
pub fn render_message(
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
    message_id: &str,
    date: DateTime<Utc>,
) -> String {
    let mut message = String::with_capacity(256 + body.len());

    let _ = write!(message, "From: {from}\r\n");
    let _ = write!(message, "To: {to}\r\n");
    let _ = write!(message, "Subject: {}\r\n", encode_header_value(subject));
    let _ = write!(message, "Date: {}\r\n", date.to_rfc2822());
    let _ = write!(message, "Message-ID: {message_id}\r\n");
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str("Content-Type: text/plain; charset=utf-8\r\n");
    message.push_str("Content-Transfer-Encoding: 8bit\r\n");
    message.push_str("\r\n");

    for line in body.lines() {
        message.push_str(line);
        message.push_str("\r\n");
    }
    message
}

/// Encodes a header value as an RFC 2047 word when it is not plain ASCII.
fn encode_header_value(value: &str) -> String {
    let value: String = value.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    if value.is_ascii() {
        value
    } else {
        format!(
            "=?UTF-8?B?{}?=",
            base64::engine::general_purpose::STANDARD.encode(value.as_bytes())
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn renders_headers_and_crlf_body() {
        let date = Utc.with_ymd_and_hms(2024, 5, 6, 13, 0, 0).unwrap();
        let message = render_message(
            "warm@example.com",
            "peer@example.org",
            "Ping",
            "> earlier\n\nQuick update from my side.",
            "<id@example.com>",
            date,
        );
        assert!(message.starts_with("From: warm@example.com\r\nTo: peer@example.org\r\n"));
        assert!(message.contains("Subject: Ping\r\n"));
        assert!(message.contains("Date: Mon, 6 May 2024 13:00:00 +0000\r\n"));
        assert!(message.contains("Message-ID: <id@example.com>\r\n"));
        assert!(message.ends_with("\r\n\r\n> earlier\r\n\r\nQuick update from my side.\r\n"));
    }

    #[test]
    fn non_ascii_subjects_are_encoded() {
        assert_eq!(encode_header_value("Ping"), "Ping");
        assert_eq!(encode_header_value("Café"), "=?UTF-8?B?Q2Fmw6k=?=");
        assert_eq!(encode_header_value("a\r\nBcc: x"), "aBcc: x");
    }

    #[test]
    fn smtp_errors_are_classified() {
        let auth: TransportError = mailwarm_smtp::Error::rejected(535, "bad credentials").into();
        assert_eq!(auth.kind, TransportErrorKind::Auth);

        let rejected: TransportError = mailwarm_smtp::Error::rejected(550, "no such user").into();
        assert_eq!(rejected.kind, TransportErrorKind::Rejected);
        assert!(rejected.detail.contains("no such user"));

        let io = connect_error(mailwarm_smtp::Error::Io(std::io::Error::other("refused")));
        assert_eq!(io.kind, TransportErrorKind::Connect);
    }

    #[tokio::test]
    async fn missing_host_is_a_configuration_error() {
        let mut inbox = crate::testing::inbox("warm");
        inbox.smtp.host.clear();
        let transport = SmtpTransport::new(Duration::from_secs(1));
        let err = transport
            .send(&inbox, "peer@example.org", "Ping", "hello")
            .await
            .unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Configuration);
    }
}
