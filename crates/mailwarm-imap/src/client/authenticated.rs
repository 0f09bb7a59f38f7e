//! Commands valid once authenticated.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, Selected};
use crate::Result;
use crate::command::Command;
use crate::response;

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Selects a mailbox read-write. Returns the client in the selected
    /// state together with the mailbox's message count.
    pub async fn select(mut self, mailbox: &str) -> Result<(Client<S, Selected>, u32)> {
        let responses = self
            .execute(&Command::Select {
                mailbox: mailbox.to_string(),
            })
            .await?;
        let exists = response::parse_exists(&responses).unwrap_or(0);
        tracing::debug!(mailbox, exists, "mailbox selected");

        let client = self.transition(Selected {
            mailbox: Arc::from(mailbox),
            exists,
        });
        Ok((client, exists))
    }
}
