//! Commands valid with a mailbox selected.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::Selected;
use crate::Result;
use crate::command::Command;
use crate::response;
use crate::types::{Flag, MessageHeaders, Uid};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the selected mailbox state.
    #[must_use]
    pub const fn selected(&self) -> &Selected {
        &self.state
    }

    /// Runs `UID SEARCH` with raw criteria such as `UNSEEN`.
    pub async fn uid_search(&mut self, criteria: &str) -> Result<Vec<Uid>> {
        let responses = self
            .execute(&Command::UidSearch {
                criteria: criteria.to_string(),
            })
            .await?;
        Ok(response::parse_search(&responses))
    }

    /// Fetches envelope headers without setting `\Seen`.
    pub async fn uid_fetch_headers(&mut self, uids: &[Uid]) -> Result<Vec<MessageHeaders>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let responses = self
            .execute(&Command::UidFetchHeaders {
                uids: uids.to_vec(),
            })
            .await?;
        Ok(response::parse_fetch_headers(&responses))
    }

    /// Adds flags to one message.
    pub async fn uid_add_flags(&mut self, uid: Uid, flags: &[Flag]) -> Result<()> {
        if flags.is_empty() {
            return Ok(());
        }
        self.execute(&Command::UidAddFlags {
            uids: vec![uid],
            flags: flags.to_vec(),
        })
        .await
        .map(|_| ())
    }
}
