//! Type-state IMAP client.
//!
//! Each state only exposes the commands valid in it; transitions consume the
//! client and return it in the new state.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use tokio::io::{AsyncRead, AsyncWrite};

pub use self::states::{Authenticated, NotAuthenticated, Selected};
use crate::command::{Command, TagGenerator};
use crate::connection::FramedStream;
use crate::response::{self, Response};
use crate::{Error, Result};

/// IMAP client connection with type-state.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tags: TagGenerator,
    pub(crate) state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tags", &self.tags)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Logs out and closes the session.
    ///
    /// The server's `* BYE` is expected here and is not treated as an error.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tags.next_tag();
        self.stream
            .write_command(&Command::Logout.serialize(&tag))
            .await?;

        loop {
            match self.stream.read_response().await {
                Ok(response) if response.is_tagged(&tag) => {
                    return response::check_tagged_ok(&[response], &tag);
                }
                Ok(_) => {}
                // Some servers close right after BYE.
                Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sends a command and returns every response up to and including its
    /// tagged completion, which must be OK.
    pub(crate) async fn execute(&mut self, command: &Command) -> Result<Vec<Response>> {
        let tag = self.tags.next_tag();
        if command.is_sensitive() {
            tracing::trace!(%tag, "C: <credentials redacted>");
        } else {
            tracing::trace!(%tag, ?command, "C:");
        }

        self.stream.write_command(&command.serialize(&tag)).await?;
        let responses = self.stream.read_until_tagged(&tag).await?;
        response::check_tagged_ok(&responses, &tag)?;
        Ok(responses)
    }

    fn transition<Next>(self, state: Next) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tags: self.tags,
            state,
        }
    }
}
