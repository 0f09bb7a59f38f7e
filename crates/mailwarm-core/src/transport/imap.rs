//! IMAP adapter for the inbound pass.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use mailwarm_imap::connection::{ImapStream, connect_plain, connect_tls};
use mailwarm_imap::{Client, Flag, Selected, Uid};
use tokio::time::error::Elapsed;
use tracing::debug;

use super::{InboundMessage, InboundTransport, TransportError, TransportErrorKind};
use crate::model::{Inbox, InboxId, Security};

type Session = Client<ImapStream, Selected>;

/// Polls each inbox's `INBOX` folder over IMAP.
///
/// A session opened by [`fetch_unseen`](InboundTransport::fetch_unseen) is
/// reused by the flag operations that follow and closed by
/// [`finish`](InboundTransport::finish).
pub struct ImapTransport {
    io_timeout: Duration,
    sessions: Mutex<HashMap<InboxId, Session>>,
}

impl std::fmt::Debug for ImapTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapTransport")
            .field("io_timeout", &self.io_timeout)
            .finish_non_exhaustive()
    }
}

impl ImapTransport {
    /// Creates a transport bounding every round trip by `io_timeout`.
    #[must_use]
    pub fn new(io_timeout: Duration) -> Self {
        Self {
            io_timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn take(&self, id: &InboxId) -> Option<Session> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    fn put(&self, id: &InboxId, session: Session) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), session);
    }

    async fn session(&self, inbox: &Inbox) -> Result<Session, TransportError> {
        if let Some(session) = self.take(&inbox.id) {
            return Ok(session);
        }
        tokio::time::timeout(self.io_timeout, open(inbox))
            .await
            .map_err(|_| TransportError::timeout("IMAP login"))?
    }

    /// Returns the session to the cache unless the connection is suspect.
    fn settle<T>(
        &self,
        id: &InboxId,
        session: Session,
        result: Result<mailwarm_imap::Result<T>, Elapsed>,
        operation: &str,
    ) -> Result<T, TransportError> {
        match result {
            Ok(Ok(value)) => {
                self.put(id, session);
                Ok(value)
            }
            Ok(Err(e)) => {
                if e.is_rejection() {
                    self.put(id, session);
                }
                Err(e.into())
            }
            Err(_) => Err(TransportError::timeout(operation)),
        }
    }

    async fn add_flag(&self, inbox: &Inbox, id: &str, flag: Flag) -> Result<(), TransportError> {
        let uid = parse_uid(id)?;
        let mut session = self.session(inbox).await?;
        let result =
            tokio::time::timeout(self.io_timeout, session.uid_add_flags(uid, &[flag])).await;
        self.settle(&inbox.id, session, result, "IMAP STORE")
    }
}

#[async_trait]
impl InboundTransport for ImapTransport {
    async fn fetch_unseen(&self, inbox: &Inbox) -> Result<Vec<InboundMessage>, TransportError> {
        let mut session = self.session(inbox).await?;
        let result = tokio::time::timeout(self.io_timeout, async {
            let uids = session.uid_search("UNSEEN").await?;
            session.uid_fetch_headers(&uids).await
        })
        .await;
        let headers = self.settle(&inbox.id, session, result, "IMAP fetch")?;
        debug!(inbox = %inbox.id, unseen = headers.len(), "fetched unseen headers");

        Ok(headers
            .into_iter()
            .map(|h| InboundMessage {
                id: h.uid.to_string(),
                reply_to: h.reply_to.unwrap_or_else(|| h.from.clone()),
                from: h.from,
                subject: h.subject,
                message_id: h.message_id,
            })
            .collect())
    }

    async fn mark_seen(&self, inbox: &Inbox, id: &str) -> Result<(), TransportError> {
        self.add_flag(inbox, id, Flag::Seen).await
    }

    async fn flag(&self, inbox: &Inbox, id: &str) -> Result<(), TransportError> {
        self.add_flag(inbox, id, Flag::Flagged).await
    }

    async fn finish(&self, inbox: &Inbox) {
        if let Some(session) = self.take(&inbox.id) {
            match tokio::time::timeout(self.io_timeout, session.logout()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(inbox = %inbox.id, error = %e, "IMAP logout failed"),
                Err(_) => debug!(inbox = %inbox.id, "IMAP logout timed out"),
            }
        }
    }
}

async fn open(inbox: &Inbox) -> Result<Session, TransportError> {
    let config = &inbox.imap;
    if !config.is_complete() {
        return Err(TransportError::new(
            TransportErrorKind::Configuration,
            "IMAP credentials are incomplete",
        ));
    }

    let port = config.effective_port();
    let stream = match config.security {
        Security::Tls => connect_tls(&config.host, port).await,
        Security::StartTls | Security::None => connect_plain(&config.host, port).await,
    }
    .map_err(connect_error)?;

    let client = Client::from_stream(stream).await.map_err(connect_error)?;
    let client = if config.security == Security::StartTls {
        client.starttls(&config.host).await.map_err(connect_error)?
    } else {
        client
    };

    let client = client
        .login(&config.username, &config.password)
        .await
        .map_err(|e| match e {
            mailwarm_imap::Error::No(text) => TransportError::new(TransportErrorKind::Auth, text),
            other => other.into(),
        })?;
    let (session, exists) = client.select("INBOX").await?;
    debug!(inbox = %inbox.id, exists, "IMAP session opened");
    Ok(session)
}

fn parse_uid(id: &str) -> Result<Uid, TransportError> {
    id.parse::<u32>()
        .ok()
        .and_then(Uid::new)
        .ok_or_else(|| TransportError::new(TransportErrorKind::Protocol, format!("invalid UID {id:?}")))
}

fn connect_error(error: mailwarm_imap::Error) -> TransportError {
    TransportError::new(TransportErrorKind::Connect, error.to_string())
}

impl From<mailwarm_imap::Error> for TransportError {
    fn from(error: mailwarm_imap::Error) -> Self {
        use mailwarm_imap::Error as E;

        let kind = match &error {
            E::Io(_) | E::Tls(_) | E::InvalidDnsName(_) | E::Bye(_) => TransportErrorKind::Connect,
            E::No(_) | E::Bad(_) => TransportErrorKind::Rejected,
            E::InvalidState(_) | E::Protocol(_) => TransportErrorKind::Protocol,
        };
        Self::new(kind, error.to_string())
    }
}
