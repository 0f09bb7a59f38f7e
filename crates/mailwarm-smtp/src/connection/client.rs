//! Type-state SMTP client.

use std::marker::PhantomData;

use base64::Engine;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

use super::{ServerInfo, SmtpStream};
use crate::command::{Command, encode_data};
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Extension, Reply, ReplyCode};

/// Longest reply line accepted before the server is considered broken.
const MAX_REPLY_LINE: usize = 4096;

/// Type-state marker: greeted, not authenticated.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker: authenticated (or ready for a new transaction).
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker: `MAIL FROM` accepted, collecting recipients.
#[derive(Debug)]
pub struct Envelope;

/// SMTP client with type-state pattern.
#[derive(Debug)]
pub struct Client<S, State> {
    reader: BufReader<S>,
    server_info: ServerInfo,
    recipients: usize,
    _state: PhantomData<State>,
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the server information gathered so far.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Sends QUIT and closes the session (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects QUIT.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(&Command::Quit).await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        Ok(())
    }

    fn transition<Next>(self) -> Client<S, Next> {
        Client {
            reader: self.reader,
            server_info: self.server_info,
            recipients: self.recipients,
            _state: PhantomData,
        }
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        let data = cmd.serialize();
        if matches!(cmd, Command::Auth { .. }) {
            trace!("C: AUTH <redacted>");
        } else {
            trace!("C: {}", String::from_utf8_lossy(&data).trim_end());
        }
        self.write_all(&data).await?;
        self.read_reply().await
    }

    /// Sends a command and requires a 2xx reply.
    async fn expect_success(&mut self, cmd: &Command) -> Result<Reply> {
        let reply = self.send_command(cmd).await?;
        if reply.is_success() {
            Ok(reply)
        } else {
            Err(reply.into_error())
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            let read = self.reader.read_line(&mut line).await?;
            if read == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }
            if line.len() > MAX_REPLY_LINE {
                return Err(Error::Protocol("reply line too long".into()));
            }

            let line = line.trim_end().to_string();
            if line.is_empty() {
                continue;
            }
            trace!("S: {line}");

            let is_last = is_last_reply_line(&line);
            lines.push(line);
            if is_last {
                break;
            }
        }

        parse_reply(&lines)
    }

    async fn negotiate(&mut self, client_hostname: &str) -> Result<()> {
        let reply = self
            .expect_success(&Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;

        // First line is the server greeting, the rest are keywords.
        self.server_info.extensions = reply
            .message
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();
        Ok(())
    }

    async fn start_transaction(mut self, from: Address) -> Result<Client<S, Envelope>> {
        self.expect_success(&Command::MailFrom { from }).await?;
        self.recipients = 0;
        Ok(self.transition())
    }
}

impl<S> Client<S, Connected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server refuses
    /// the session.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut client = Self {
            reader: BufReader::new(stream),
            server_info: ServerInfo::default(),
            recipients: 0,
            _state: PhantomData,
        };

        let greeting = client.read_reply().await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(greeting.into_error());
        }

        client.server_info.hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        Ok(client)
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects EHLO.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        self.negotiate(client_hostname).await?;
        Ok(self)
    }

    /// Authenticates using the PLAIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses the credentials.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        let credentials = format!("\0{username}\0{password}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());

        self.expect_success(&Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some(encoded),
        })
        .await?;

        Ok(self.transition())
    }

    /// Starts a transaction without authenticating (relay-permitted hosts).
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects `MAIL FROM`.
    pub async fn mail_from(self, from: Address) -> Result<Client<S, Envelope>> {
        self.start_transaction(from).await
    }
}

impl Client<SmtpStream, Connected> {
    /// Upgrades the session to TLS with STARTTLS and re-issues EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not advertised or the upgrade fails.
    pub async fn starttls(mut self, hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        self.expect_success(&Command::StartTls).await?;

        let stream = self.reader.into_inner().upgrade_to_tls(hostname).await?;
        let mut client = Self {
            reader: BufReader::new(stream),
            server_info: ServerInfo {
                hostname: self.server_info.hostname,
                extensions: Vec::new(),
            },
            recipients: 0,
            _state: PhantomData,
        };
        client.negotiate(hostname).await?;
        Ok(client)
    }
}

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects `MAIL FROM`.
    pub async fn mail_from(self, from: Address) -> Result<Client<S, Envelope>> {
        self.start_transaction(from).await
    }
}

impl<S> Client<S, Envelope>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Adds a recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the recipient.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Self> {
        self.expect_success(&Command::RcptTo { to }).await?;
        self.recipients += 1;
        Ok(self)
    }

    /// Sends the message content and completes the transaction.
    ///
    /// Line endings are normalized to CRLF and leading dots are stuffed.
    ///
    /// # Errors
    ///
    /// Returns an error if no recipient was accepted, the message exceeds the
    /// advertised size limit, or the server rejects the data.
    pub async fn send_data(mut self, message: &[u8]) -> Result<Client<S, Authenticated>> {
        if self.recipients == 0 {
            return Err(Error::Protocol("DATA without any accepted recipient".into()));
        }
        if let Some(limit) = self.server_info.max_message_size()
            && limit > 0
            && message.len() > limit
        {
            return Err(Error::Protocol(format!(
                "message of {} bytes exceeds server limit of {limit}",
                message.len()
            )));
        }

        let reply = self.send_command(&Command::Data).await?;
        if reply.code != ReplyCode::START_DATA {
            return Err(reply.into_error());
        }

        self.write_all(&encode_data(message)).await?;
        let reply = self.read_reply().await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }

        self.recipients = 0;
        Ok(self.transition())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn full_submission_session() {
        let mock = Builder::new()
            .read(b"220 mx.example.com ESMTP ready\r\n")
            .write(b"EHLO warm.example.com\r\n")
            .read(b"250-mx.example.com\r\n250-SIZE 1000\r\n250 AUTH PLAIN LOGIN\r\n")
            .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
            .read(b"235 2.7.0 Authentication successful\r\n")
            .write(b"MAIL FROM:<user@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<peer@example.org>\r\n")
            .read(b"250 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go ahead\r\n")
            .write(b"Subject: hi\r\n\r\nhello\r\n.\r\n")
            .read(b"250 queued\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        assert_eq!(client.server_info().hostname, "mx.example.com");

        let client = client.ehlo("warm.example.com").await.unwrap();
        assert_eq!(client.server_info().max_message_size(), Some(1000));

        let client = client
            .auth_plain("user", "pass")
            .await
            .unwrap()
            .mail_from(Address::new("user@example.com").unwrap())
            .await
            .unwrap()
            .rcpt_to(Address::new("peer@example.org").unwrap())
            .await
            .unwrap()
            .send_data(b"Subject: hi\n\nhello\n")
            .await
            .unwrap();
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn rejected_greeting() {
        let mock = Builder::new().read(b"554 no service\r\n").build();
        let err = Client::from_stream(mock).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn failed_auth_is_reported() {
        let mock = Builder::new()
            .read(b"220 mx ready\r\n")
            .write(b"AUTH PLAIN AHUAcA==\r\n")
            .read(b"535 5.7.8 bad credentials\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let err = client.auth_plain("u", "p").await.unwrap_err();
        assert!(err.is_auth_failure());
    }

    #[tokio::test]
    async fn data_requires_recipient() {
        let mock = Builder::new()
            .read(b"220 mx ready\r\n")
            .write(b"MAIL FROM:<a@example.com>\r\n")
            .read(b"250 OK\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let envelope = client
            .mail_from(Address::new("a@example.com").unwrap())
            .await
            .unwrap();
        let err = envelope.send_data(b"x").await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn rejected_recipient() {
        let mock = Builder::new()
            .read(b"220 mx ready\r\n")
            .write(b"MAIL FROM:<a@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<nobody@example.org>\r\n")
            .read(b"550 5.1.1 no such user\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let err = client
            .mail_from(Address::new("a@example.com").unwrap())
            .await
            .unwrap()
            .rcpt_to(Address::new("nobody@example.org").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "SMTP error 550: 5.1.1 no such user");
    }
}
