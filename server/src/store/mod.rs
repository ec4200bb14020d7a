//! Persistence Gateway.
//!
//! `QuoteStore` / `StoreConnection` are the backend seam; the gateway wraps a
//! backend with per-operation deadlines and scoped connection ownership.

pub mod errors;
pub mod gateway;
pub mod sqlite;

use async_trait::async_trait;

pub use errors::StorageError;
pub use gateway::{GatewaySession, PersistenceGateway};
pub use sqlite::SqliteQuoteStore;

use crate::model::Quote;

#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Opens one dedicated connection.
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StorageError>;
}

#[async_trait]
pub trait StoreConnection: Send {
    /// Creates the record table if absent. Must be idempotent.
    async fn ensure_schema(&mut self) -> Result<(), StorageError>;

    /// Appends one record. Never updates or deduplicates.
    async fn append_record(&mut self, quote: &Quote) -> Result<(), StorageError>;

    /// Shuts the connection down, returning once the backend has finished
    /// with everything already sent on it.
    async fn close(self: Box<Self>) -> Result<(), StorageError>;
}
