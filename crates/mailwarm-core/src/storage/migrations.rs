//! Versioned schema migrations tracked in `_migrations`.

use chrono::Utc;
use futures::future::BoxFuture;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use tracing::info;

use super::sqlite::timestamp;
use crate::Result;

/// Data-dependent step run after a migration's statements, in the same
/// transaction.
pub type Repair = for<'c> fn(&'c mut SqliteConnection) -> BoxFuture<'c, Result<()>>;

/// One schema step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Monotonic version.
    pub version: i64,
    /// Short description.
    pub name: &'static str,
    /// Statements to run, in order.
    pub statements: &'static [&'static str],
    /// Runs after `statements`.
    pub repair: Option<Repair>,
}

/// All migrations, oldest first.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial schema",
        statements: &[
            r"
            CREATE TABLE IF NOT EXISTS inbox (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL UNIQUE,
                provider TEXT NOT NULL DEFAULT 'smtp',
                daily_target INTEGER NOT NULL DEFAULT 20,
                active INTEGER NOT NULL DEFAULT 1,
                smtp_host TEXT NOT NULL DEFAULT '',
                smtp_port INTEGER NOT NULL DEFAULT 0,
                smtp_security TEXT NOT NULL DEFAULT 'starttls',
                smtp_user TEXT NOT NULL DEFAULT '',
                smtp_pass TEXT NOT NULL DEFAULT '',
                imap_host TEXT NOT NULL DEFAULT '',
                imap_port INTEGER NOT NULL DEFAULT 0,
                imap_security TEXT NOT NULL DEFAULT 'tls',
                imap_user TEXT NOT NULL DEFAULT '',
                imap_pass TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS peer_pool (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                inbox_id TEXT NOT NULL REFERENCES inbox(id) ON DELETE CASCADE,
                peer_email TEXT NOT NULL,
                weight INTEGER NOT NULL DEFAULT 1
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_peer_pool_inbox ON peer_pool(inbox_id)",
            r"
            CREATE TABLE IF NOT EXISTS send_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                inbox_id TEXT REFERENCES inbox(id) ON DELETE SET NULL,
                to_email TEXT NOT NULL,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                provider_message_id TEXT,
                success INTEGER NOT NULL,
                error TEXT,
                sent_at TEXT NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_send_log_inbox_sent ON send_log(inbox_id, sent_at)",
        ],
        repair: None,
    },
    Migration {
        version: 2,
        name: "peer_pool.created_at",
        // Databases created by older releases may already have the column.
        statements: &[],
        repair: Some(repair_peer_created_at),
    },
    Migration {
        version: 3,
        name: "read_log",
        statements: &[
            r"
            CREATE TABLE IF NOT EXISTS read_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                inbox_id TEXT REFERENCES inbox(id) ON DELETE SET NULL,
                message_id TEXT NOT NULL,
                action TEXT NOT NULL,
                at TEXT NOT NULL
            )
            ",
        ],
        repair: None,
    },
];

/// Applies pending migrations. Returns how many ran.
///
/// # Errors
///
/// Returns an error if any statement fails; the failing migration is rolled
/// back and later ones are not attempted.
pub async fn migrate(pool: &SqlitePool) -> Result<usize> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )
        ",
    )
    .execute(pool)
    .await?;

    let applied: Vec<i64> = sqlx::query("SELECT version FROM _migrations")
        .fetch_all(pool)
        .await?
        .iter()
        .map(|row| row.try_get::<i64, _>("version"))
        .collect::<std::result::Result<_, _>>()?;

    let mut count = 0;
    for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
        let mut tx = pool.begin().await?;
        for statement in migration.statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        if let Some(repair) = migration.repair {
            repair(&mut *tx).await?;
        }
        sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .bind(timestamp(Utc::now()))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(version = migration.version, name = migration.name, "applied migration");
        count += 1;
    }
    Ok(count)
}

/// Adds `peer_pool.created_at` when it is missing.
fn repair_peer_created_at(conn: &mut SqliteConnection) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let present: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('peer_pool') WHERE name = 'created_at'",
        )
        .fetch_one(&mut *conn)
        .await?;

        if present == 0 {
            sqlx::query(
                "ALTER TABLE peer_pool ADD COLUMN created_at TEXT NOT NULL DEFAULT '1970-01-01T00:00:00.000000Z'",
            )
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = memory_pool().await;
        assert_eq!(migrate(&pool).await.unwrap(), MIGRATIONS.len());
        assert_eq!(migrate(&pool).await.unwrap(), 0);

        let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM _migrations ORDER BY version")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn repair_steps_are_declared_per_migration() {
        let with_repair: Vec<i64> = MIGRATIONS
            .iter()
            .filter(|m| m.repair.is_some())
            .map(|m| m.version)
            .collect();
        assert_eq!(with_repair, vec![2]);
        assert!(MIGRATIONS.windows(2).all(|w| w[0].version < w[1].version));
    }

    #[tokio::test]
    async fn repair_is_a_no_op_on_a_current_schema() {
        let pool = memory_pool().await;
        migrate(&pool).await.unwrap();

        let columns: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('peer_pool') WHERE name = 'created_at'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(columns, 1);

        let mut conn = pool.acquire().await.unwrap();
        for migration in MIGRATIONS {
            if let Some(repair) = migration.repair {
                repair(&mut *conn).await.unwrap();
            }
        }
    }

    #[tokio::test]
    async fn repairs_legacy_peer_table() {
        let pool = memory_pool().await;
        sqlx::query("CREATE TABLE inbox (id TEXT PRIMARY KEY, label TEXT NOT NULL UNIQUE, provider TEXT NOT NULL DEFAULT 'smtp', daily_target INTEGER NOT NULL DEFAULT 20, active INTEGER NOT NULL DEFAULT 1, smtp_host TEXT NOT NULL DEFAULT '', smtp_port INTEGER NOT NULL DEFAULT 0, smtp_security TEXT NOT NULL DEFAULT 'starttls', smtp_user TEXT NOT NULL DEFAULT '', smtp_pass TEXT NOT NULL DEFAULT '', imap_host TEXT NOT NULL DEFAULT '', imap_port INTEGER NOT NULL DEFAULT 0, imap_security TEXT NOT NULL DEFAULT 'tls', imap_user TEXT NOT NULL DEFAULT '', imap_pass TEXT NOT NULL DEFAULT '', created_at TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE peer_pool (id INTEGER PRIMARY KEY AUTOINCREMENT, inbox_id TEXT NOT NULL, peer_email TEXT NOT NULL, weight INTEGER NOT NULL DEFAULT 1)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO inbox (id, label, created_at) VALUES ('i1', 'legacy', '2024-01-01T00:00:00.000000Z')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO peer_pool (inbox_id, peer_email) VALUES ('i1', 'old@x.com')")
            .execute(&pool)
            .await
            .unwrap();

        migrate(&pool).await.unwrap();

        let created: String = sqlx::query_scalar("SELECT created_at FROM peer_pool")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(created, "1970-01-01T00:00:00.000000Z");
    }
}
