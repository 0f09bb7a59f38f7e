//! Persistence for inboxes, peers and activity logs.

mod migrations;
mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use self::migrations::{MIGRATIONS, Migration, migrate};
pub use self::sqlite::SqliteStore;
use crate::Result;
use crate::model::{Inbox, InboxId, NewSendLog, Peer, ReadEvent};

/// Storage operations the warm-up pipeline depends on.
///
/// Log appends are independent inserts, so concurrent inbox pipelines can
/// share one store.
#[async_trait]
pub trait WarmupStore: Send + Sync {
    /// Inboxes with `active` set.
    async fn list_active_inboxes(&self) -> Result<Vec<Inbox>>;

    /// Peer pool of an inbox.
    async fn list_peers(&self, inbox: &InboxId) -> Result<Vec<Peer>>;

    /// Send attempts (successful or not) logged for `inbox` at or after `since`.
    async fn count_sends_since(&self, inbox: &InboxId, since: DateTime<Utc>) -> Result<usize>;

    /// Records one send attempt.
    async fn append_send_log(&self, entry: NewSendLog) -> Result<()>;

    /// Records an engagement event.
    async fn append_read_event(&self, event: &ReadEvent) -> Result<()>;
}
