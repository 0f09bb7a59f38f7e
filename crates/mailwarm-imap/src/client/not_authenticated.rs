//! Commands valid before authentication.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::command::{Command, TagGenerator};
use crate::connection::{FramedStream, ImapStream};
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a connected stream by reading the greeting.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut framed = FramedStream::new(stream);

        let greeting = framed.read_response().await?;
        if let Some(text) = greeting.bye_text() {
            return Err(Error::Bye(text.to_string()));
        }
        let Some(status) = greeting.untagged() else {
            return Err(Error::Protocol(format!(
                "unexpected greeting: {}",
                greeting.text
            )));
        };
        if !(status.starts_with("OK") || status.starts_with("PREAUTH")) {
            return Err(Error::Protocol(format!("unexpected greeting: {status}")));
        }

        Ok(Self {
            stream: framed,
            tags: TagGenerator::default(),
            state: NotAuthenticated,
        })
    }

    /// Authenticates with LOGIN.
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        self.execute(&Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        })
        .await?;
        tracing::debug!(username, "IMAP login succeeded");
        Ok(self.transition(Authenticated))
    }
}

impl Client<ImapStream, NotAuthenticated> {
    /// Upgrades a plaintext connection with STARTTLS.
    pub async fn starttls(mut self, host: &str) -> Result<Self> {
        if self.stream_is_tls() {
            return Err(Error::InvalidState("connection is already TLS".to_string()));
        }
        self.execute(&Command::StartTls).await?;

        let tags = self.tags;
        let stream = self.stream.into_inner().upgrade_to_tls(host).await?;
        Ok(Self {
            stream: FramedStream::new(stream),
            tags,
            state: NotAuthenticated,
        })
    }

    fn stream_is_tls(&self) -> bool {
        self.stream.get_ref().is_tls()
    }
}
