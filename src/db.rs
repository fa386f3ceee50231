// src/db.rs
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

use crate::error::PollError;

/// Opens the pool and brings the schema up to date.
///
/// `sqlite::memory:` gives every pooled connection its own database, so
/// tests and tools should point at a file instead.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool, PollError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!(database_url, max_connections, "database connected and migrated");

    Ok(pool)
}

/// A `BEGIN IMMEDIATE` transaction.
///
/// The write lock is taken up front, so concurrent writers queue on the busy
/// timeout instead of failing when a read snapshot goes stale mid-transaction.
pub struct WriteTx {
    conn: PoolConnection<Sqlite>,
    open: bool,
}

impl WriteTx {
    pub async fn begin(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(Self { conn, open: true })
    }

    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    pub async fn commit(mut self) -> Result<(), sqlx::Error> {
        sqlx::query("COMMIT").execute(&mut *self.conn).await?;
        self.open = false;
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), sqlx::Error> {
        sqlx::query("ROLLBACK").execute(&mut *self.conn).await?;
        self.open = false;
        Ok(())
    }

    /// Commits on `Ok`, rolls back on `Err` and hands the outcome back.
    pub async fn finish<T>(self, outcome: Result<T, PollError>) -> Result<T, PollError> {
        match outcome {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                self.rollback().await?;
                Err(err)
            }
        }
    }
}

impl Drop for WriteTx {
    fn drop(&mut self) {
        // A connection still inside a transaction must not go back to the pool;
        // closing it makes SQLite roll the transaction back.
        if self.open {
            self.conn.close_on_drop();
        }
    }
}
