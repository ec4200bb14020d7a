//! SQLite backend: one `SqliteConnection` per request, no pool.
//!
//! Statements run on sqlx's worker thread, which finishes a statement even
//! after the awaiting future is dropped. Every write therefore runs inside a
//! transaction: dropping the `Transaction` queues a `ROLLBACK` behind the
//! in-flight statement, so an interrupted step leaves nothing behind.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use tracing::instrument;

use super::{QuoteStore, StorageError, StoreConnection};
use crate::model::Quote;

const CREATE_QUOTES: &str = r#"
CREATE TABLE IF NOT EXISTS quotes (
  code        VARCHAR(10),
  codein      VARCHAR(10),
  name        VARCHAR(100),
  high        VARCHAR(20),
  low         VARCHAR(20),
  var_bid     VARCHAR(20),
  pct_change  VARCHAR(10),
  bid         VARCHAR(20),
  ask         VARCHAR(20),
  timestamp   VARCHAR(20),
  create_date VARCHAR(20)
);
"#;

const INSERT_QUOTE: &str = r#"
INSERT INTO quotes
  (code, codein, name, high, low, var_bid, pct_change, bid, ask, timestamp, create_date)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);
"#;

pub struct SqliteQuoteStore {
    options: SqliteConnectOptions,
}

impl SqliteQuoteStore {
    /// Accepts any sqlx SQLite URL (`sqlite://cotacao.db`,
    /// `sqlite:file:name?mode=memory&cache=shared`, ...). The database file is
    /// created on first connect.
    ///
    /// `busy_timeout` bounds how long a statement waits on a locked database
    /// before failing. Keep it at or below the store budgets so a blocked
    /// worker does not outlive the step that issued the statement.
    pub fn new(database_url: &str, busy_timeout: Duration) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(busy_timeout);
        Ok(Self { options })
    }
}

#[async_trait]
impl QuoteStore for SqliteQuoteStore {
    #[instrument(skip(self), level = "debug")]
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StorageError> {
        let conn = self.options.connect().await?;
        Ok(Box::new(SqliteStoreConnection { conn }))
    }
}

struct SqliteStoreConnection {
    conn: SqliteConnection,
}

#[async_trait]
impl StoreConnection for SqliteStoreConnection {
    #[instrument(skip(self), level = "debug")]
    async fn ensure_schema(&mut self) -> Result<(), StorageError> {
        let mut tx = self.conn.begin().await?;
        sqlx::query(CREATE_QUOTES).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, quote), fields(bid = %quote.bid), level = "debug")]
    async fn append_record(&mut self, quote: &Quote) -> Result<(), StorageError> {
        let mut tx = self.conn.begin().await?;
        sqlx::query(INSERT_QUOTE)
            .bind(quote.code.as_str())
            .bind(quote.codein.as_str())
            .bind(quote.name.as_str())
            .bind(quote.high.as_str())
            .bind(quote.low.as_str())
            .bind(quote.var_bid.as_str())
            .bind(quote.pct_change.as_str())
            .bind(quote.bid.as_str())
            .bind(quote.ask.as_str())
            .bind(quote.timestamp.as_str())
            .bind(quote.create_date.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), StorageError> {
        // Waits for the worker to drain queued commands (including a pending
        // rollback) and shut down.
        let SqliteStoreConnection { conn } = *self;
        conn.close().await?;
        Ok(())
    }
}
