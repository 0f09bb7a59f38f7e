//! SQLite-backed store.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::debug;

use super::{WarmupStore, migrations};
use crate::model::{
    ImapConfig, Inbox, InboxId, InboxUpdate, NewInbox, NewSendLog, Peer, ReadAction, ReadEvent,
    Security, SendLogEntry, SmtpConfig,
};
use crate::{Error, Result};

const INBOX_COLUMNS: &str = r"
    id, label, provider, daily_target, active,
    smtp_host, smtp_port, smtp_security, smtp_user, smtp_pass,
    imap_host, imap_port, imap_security, imap_user, imap_pass,
    created_at
";

/// Formats a timestamp the way it is stored: fixed-width RFC 3339 UTC, so
/// string order equals time order.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time at storage precision.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Storage(sqlx::Error::Decode(Box::new(e))))
}

/// Store for inboxes, peer pools and activity logs.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and applies pending
    /// migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn open(path: &Path) -> Result<Self> {
        let store = Self::connect(path).await?;
        store.migrate().await?;
        Ok(store)
    }

    /// Opens (creating if needed) the database at `path` without touching
    /// the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub async fn connect(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        debug!(path = %path.display(), "database opened");
        Ok(Self { pool })
    }

    /// Creates an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Applies pending migrations, returning how many ran.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<usize> {
        migrations::migrate(&self.pool).await
    }

    /// Creates an inbox.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty or duplicate label.
    pub async fn create_inbox(&self, new: NewInbox) -> Result<Inbox> {
        let label = new.label.trim().to_string();
        if label.is_empty() {
            return Err(Error::InvalidInput("label must not be empty".to_string()));
        }

        let inbox = Inbox {
            id: InboxId::generate(),
            label,
            provider: new.provider,
            daily_target: new.daily_target,
            active: new.active,
            smtp: new.smtp,
            imap: new.imap,
            created_at: now(),
        };

        sqlx::query(
            r"
            INSERT INTO inbox (
                id, label, provider, daily_target, active,
                smtp_host, smtp_port, smtp_security, smtp_user, smtp_pass,
                imap_host, imap_port, imap_security, imap_user, imap_pass,
                created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(inbox.id.as_str())
        .bind(&inbox.label)
        .bind(&inbox.provider)
        .bind(inbox.daily_target)
        .bind(inbox.active)
        .bind(&inbox.smtp.host)
        .bind(i64::from(inbox.smtp.port))
        .bind(inbox.smtp.security.as_str())
        .bind(&inbox.smtp.username)
        .bind(&inbox.smtp.password)
        .bind(&inbox.imap.host)
        .bind(i64::from(inbox.imap.port))
        .bind(inbox.imap.security.as_str())
        .bind(&inbox.imap.username)
        .bind(&inbox.imap.password)
        .bind(timestamp(inbox.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| label_conflict(e, &inbox.label))?;

        debug!(inbox = %inbox.id, label = %inbox.label, "inbox created");
        Ok(inbox)
    }

    /// All inboxes, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_inboxes(&self) -> Result<Vec<Inbox>> {
        let rows = sqlx::query(&format!(
            "SELECT {INBOX_COLUMNS} FROM inbox ORDER BY created_at, label"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_inbox).collect()
    }

    /// Looks up one inbox.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InboxNotFound`] if there is no such inbox.
    pub async fn get_inbox(&self, id: &InboxId) -> Result<Inbox> {
        let row = sqlx::query(&format!("SELECT {INBOX_COLUMNS} FROM inbox WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::InboxNotFound(id.to_string()))?;
        row_to_inbox(&row)
    }

    /// Changes the label, daily target or active flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InboxNotFound`] or [`Error::InvalidInput`].
    pub async fn update_inbox(&self, id: &InboxId, update: InboxUpdate) -> Result<Inbox> {
        let mut inbox = self.get_inbox(id).await?;
        if let Some(label) = update.label {
            let label = label.trim().to_string();
            if label.is_empty() {
                return Err(Error::InvalidInput("label must not be empty".to_string()));
            }
            inbox.label = label;
        }
        if let Some(target) = update.daily_target {
            inbox.daily_target = target;
        }
        if let Some(active) = update.active {
            inbox.active = active;
        }

        sqlx::query("UPDATE inbox SET label = ?, daily_target = ?, active = ? WHERE id = ?")
            .bind(&inbox.label)
            .bind(inbox.daily_target)
            .bind(inbox.active)
            .bind(inbox.id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| label_conflict(e, &inbox.label))?;

        Ok(inbox)
    }

    /// Deletes an inbox and its peer pool. Send and read logs are kept with
    /// their inbox reference cleared.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InboxNotFound`] if there is no such inbox.
    pub async fn delete_inbox(&self, id: &InboxId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<String> = sqlx::query_scalar("SELECT id FROM inbox WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(Error::InboxNotFound(id.to_string()));
        }

        let peers = sqlx::query("DELETE FROM peer_pool WHERE inbox_id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("UPDATE send_log SET inbox_id = NULL WHERE inbox_id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE read_log SET inbox_id = NULL WHERE inbox_id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM inbox WHERE id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(inbox = %id, peers, "inbox deleted");
        Ok(())
    }

    /// Adds a peer to an inbox's pool. Weight defaults to 1.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InboxNotFound`] or [`Error::InvalidInput`] for an
    /// address without `@`.
    pub async fn add_peer(
        &self,
        inbox_id: &InboxId,
        address: &str,
        weight: Option<i64>,
    ) -> Result<Peer> {
        let address = address.trim();
        if !address.contains('@') {
            return Err(Error::InvalidInput(format!(
                "not an email address: {address:?}"
            )));
        }
        // Fails with InboxNotFound before the foreign key would.
        self.get_inbox(inbox_id).await?;

        let created_at = now();
        let weight = weight.unwrap_or(1);
        let id = sqlx::query(
            "INSERT INTO peer_pool (inbox_id, peer_email, weight, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(inbox_id.as_str())
        .bind(address)
        .bind(weight)
        .bind(timestamp(created_at))
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Peer {
            id,
            inbox_id: inbox_id.clone(),
            address: address.to_string(),
            weight,
            created_at,
        })
    }

    /// Removes a peer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PeerNotFound`] if there is no such peer.
    pub async fn remove_peer(&self, peer_id: i64) -> Result<()> {
        let removed = sqlx::query("DELETE FROM peer_pool WHERE id = ?")
            .bind(peer_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if removed == 0 {
            return Err(Error::PeerNotFound(peer_id));
        }
        Ok(())
    }

    /// Most recent send attempts of an inbox, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn recent_sends(&self, inbox_id: &InboxId, limit: u32) -> Result<Vec<SendLogEntry>> {
        let rows = sqlx::query(
            r"
            SELECT id, inbox_id, to_email, subject, body, provider_message_id,
                   success, error, sent_at
            FROM send_log
            WHERE inbox_id = ?
            ORDER BY sent_at DESC, id DESC
            LIMIT ?
            ",
        )
        .bind(inbox_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_send_log).collect()
    }

    /// Recorded engagement events of an inbox, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn read_events(&self, inbox_id: &InboxId) -> Result<Vec<ReadEvent>> {
        let rows = sqlx::query(
            "SELECT inbox_id, message_id, action, at FROM read_log WHERE inbox_id = ? ORDER BY id",
        )
        .bind(inbox_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ReadEvent> {
                let action: String = row.try_get("action")?;
                let at: String = row.try_get("at")?;
                Ok(ReadEvent {
                    inbox_id: InboxId::from(row.try_get::<String, _>("inbox_id")?),
                    message_id: row.try_get("message_id")?,
                    action: ReadAction::parse(&action).ok_or_else(|| {
                        Error::Storage(sqlx::Error::Decode(
                            format!("unknown read action {action:?}").into(),
                        ))
                    })?,
                    at: parse_timestamp(&at)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl WarmupStore for SqliteStore {
    async fn list_active_inboxes(&self) -> Result<Vec<Inbox>> {
        let rows = sqlx::query(&format!(
            "SELECT {INBOX_COLUMNS} FROM inbox WHERE active = 1 ORDER BY created_at, label"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_inbox).collect()
    }

    async fn list_peers(&self, inbox: &InboxId) -> Result<Vec<Peer>> {
        let rows = sqlx::query(
            r"
            SELECT id, inbox_id, peer_email, weight, created_at
            FROM peer_pool
            WHERE inbox_id = ?
            ORDER BY id
            ",
        )
        .bind(inbox.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<Peer> {
                let created_at: String = row.try_get("created_at")?;
                Ok(Peer {
                    id: row.try_get("id")?,
                    inbox_id: InboxId::from(row.try_get::<String, _>("inbox_id")?),
                    address: row.try_get("peer_email")?,
                    weight: row.try_get("weight")?,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    async fn count_sends_since(&self, inbox: &InboxId, since: DateTime<Utc>) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM send_log WHERE inbox_id = ? AND sent_at >= ?")
                .bind(inbox.as_str())
                .bind(timestamp(since))
                .fetch_one(&self.pool)
                .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn append_send_log(&self, entry: NewSendLog) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO send_log (
                inbox_id, to_email, subject, body, provider_message_id, success, error, sent_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(entry.inbox_id.as_str())
        .bind(&entry.to)
        .bind(&entry.subject)
        .bind(&entry.body)
        .bind(&entry.provider_message_id)
        .bind(entry.success)
        .bind(&entry.error)
        .bind(timestamp(entry.sent_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_read_event(&self, event: &ReadEvent) -> Result<()> {
        sqlx::query("INSERT INTO read_log (inbox_id, message_id, action, at) VALUES (?, ?, ?, ?)")
            .bind(event.inbox_id.as_str())
            .bind(&event.message_id)
            .bind(event.action.as_str())
            .bind(timestamp(event.at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn label_conflict(error: sqlx::Error, label: &str) -> Error {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::InvalidInput(format!("label {label:?} is already in use"))
        }
        _ => Error::Storage(error),
    }
}

fn row_to_inbox(row: &SqliteRow) -> Result<Inbox> {
    let smtp_security: String = row.try_get("smtp_security")?;
    let imap_security: String = row.try_get("imap_security")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Inbox {
        id: InboxId::from(row.try_get::<String, _>("id")?),
        label: row.try_get("label")?,
        provider: row.try_get("provider")?,
        daily_target: row.try_get("daily_target")?,
        active: row.try_get("active")?,
        smtp: SmtpConfig {
            host: row.try_get("smtp_host")?,
            port: port(row.try_get("smtp_port")?),
            security: Security::parse(&smtp_security),
            username: row.try_get("smtp_user")?,
            password: row.try_get("smtp_pass")?,
        },
        imap: ImapConfig {
            host: row.try_get("imap_host")?,
            port: port(row.try_get("imap_port")?),
            security: Security::parse(&imap_security),
            username: row.try_get("imap_user")?,
            password: row.try_get("imap_pass")?,
        },
        created_at: parse_timestamp(&created_at)?,
    })
}

fn row_to_send_log(row: &SqliteRow) -> Result<SendLogEntry> {
    let sent_at: String = row.try_get("sent_at")?;
    Ok(SendLogEntry {
        id: row.try_get("id")?,
        inbox_id: row
            .try_get::<Option<String>, _>("inbox_id")?
            .map(InboxId::from),
        to: row.try_get("to_email")?,
        subject: row.try_get("subject")?,
        body: row.try_get("body")?,
        provider_message_id: row.try_get("provider_message_id")?,
        success: row.try_get("success")?,
        error: row.try_get("error")?,
        sent_at: parse_timestamp(&sent_at)?,
    })
}

fn port(value: i64) -> u16 {
    u16::try_from(value).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::testing::new_inbox;

    fn send(inbox: &InboxId, at: DateTime<Utc>, success: bool) -> NewSendLog {
        NewSendLog {
            inbox_id: inbox.clone(),
            to: "peer@x.com".to_string(),
            subject: "Ping".to_string(),
            body: "hello".to_string(),
            provider_message_id: success.then(|| "<id@x.com>".to_string()),
            success,
            error: (!success).then(|| "refused".to_string()),
            sent_at: at,
        }
    }

    #[tokio::test]
    async fn inbox_crud() {
        let store = SqliteStore::in_memory().await.unwrap();
        let created = store.create_inbox(new_inbox("primary")).await.unwrap();

        let fetched = store.get_inbox(&created.id).await.unwrap();
        assert_eq!(fetched.label, "primary");
        assert_eq!(fetched.smtp, created.smtp);
        assert_eq!(fetched.imap, created.imap);
        assert_eq!(fetched.daily_target, 20);

        let updated = store
            .update_inbox(
                &created.id,
                InboxUpdate {
                    active: Some(false),
                    daily_target: Some(35),
                    ..InboxUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.active);
        assert_eq!(updated.daily_target, 35);
        assert!(store.list_active_inboxes().await.unwrap().is_empty());
        assert_eq!(store.list_inboxes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn labels_are_unique() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.create_inbox(new_inbox("dup")).await.unwrap();
        let err = store.create_inbox(new_inbox("dup")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = store.create_inbox(new_inbox("  ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn missing_rows_are_reported() {
        let store = SqliteStore::in_memory().await.unwrap();
        let ghost = InboxId::from("ghost");
        assert!(store.get_inbox(&ghost).await.unwrap_err().is_not_found());
        assert!(store.delete_inbox(&ghost).await.unwrap_err().is_not_found());
        assert!(
            store
                .add_peer(&ghost, "a@x.com", None)
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert!(store.remove_peer(99).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn peers_default_to_weight_one() {
        let store = SqliteStore::in_memory().await.unwrap();
        let inbox = store.create_inbox(new_inbox("warm")).await.unwrap();
        store.add_peer(&inbox.id, " a@x.com ", None).await.unwrap();
        let b = store.add_peer(&inbox.id, "b@x.com", Some(9)).await.unwrap();
        assert!(matches!(
            store.add_peer(&inbox.id, "nope", None).await,
            Err(Error::InvalidInput(_))
        ));

        let peers = store.list_peers(&inbox.id).await.unwrap();
        let summary: Vec<(&str, i64)> = peers.iter().map(|p| (p.address.as_str(), p.weight)).collect();
        assert_eq!(summary, vec![("a@x.com", 1), ("b@x.com", 9)]);

        store.remove_peer(b.id).await.unwrap();
        assert_eq!(store.list_peers(&inbox.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn counts_attempts_since_midnight() {
        let store = SqliteStore::in_memory().await.unwrap();
        let inbox = store.create_inbox(new_inbox("warm")).await.unwrap();
        let midnight = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap();

        store
            .append_send_log(send(&inbox.id, midnight - Duration::microseconds(1), true))
            .await
            .unwrap();
        store.append_send_log(send(&inbox.id, midnight, true)).await.unwrap();
        store
            .append_send_log(send(&inbox.id, midnight + Duration::hours(10), false))
            .await
            .unwrap();

        assert_eq!(store.count_sends_since(&inbox.id, midnight).await.unwrap(), 2);

        let recent = store.recent_sends(&inbox.id, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert!(!recent[0].success);
        assert_eq!(recent[0].error.as_deref(), Some("refused"));
        assert_eq!(recent[1].provider_message_id.as_deref(), Some("<id@x.com>"));
    }

    #[tokio::test]
    async fn delete_cascades_peers_and_keeps_logs() {
        let store = SqliteStore::in_memory().await.unwrap();
        let inbox = store.create_inbox(new_inbox("warm")).await.unwrap();
        store.add_peer(&inbox.id, "a@x.com", None).await.unwrap();
        store.append_send_log(send(&inbox.id, Utc::now(), true)).await.unwrap();
        store
            .append_read_event(&ReadEvent {
                inbox_id: inbox.id.clone(),
                message_id: "7".to_string(),
                action: ReadAction::Opened,
                at: Utc::now(),
            })
            .await
            .unwrap();

        store.delete_inbox(&inbox.id).await.unwrap();

        assert!(store.list_peers(&inbox.id).await.unwrap().is_empty());
        let orphaned: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM send_log WHERE inbox_id IS NULL")
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_eq!(orphaned, 1);
        let events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM read_log WHERE inbox_id IS NULL")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(events, 1);
    }

    #[tokio::test]
    async fn read_events_round_trip() {
        let store = SqliteStore::in_memory().await.unwrap();
        let inbox = store.create_inbox(new_inbox("warm")).await.unwrap();
        let at = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();
        let event = ReadEvent {
            inbox_id: inbox.id.clone(),
            message_id: "42".to_string(),
            action: ReadAction::Starred,
            at,
        };
        store.append_read_event(&event).await.unwrap();
        assert_eq!(store.read_events(&inbox.id).await.unwrap(), vec![event]);
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        let early = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        let late = early + Duration::microseconds(1);
        assert!(timestamp(early) < timestamp(late));
        assert_eq!(timestamp(early), "2024-06-03T09:00:00.000000Z");
    }
}
