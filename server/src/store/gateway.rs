use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::{QuoteStore, StorageError, StoreConnection};
use crate::deadline::RequestContext;
use crate::model::Quote;

/// Upper bound on waiting for a backend connection to shut down.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Deadline-aware front for a [`QuoteStore`].
///
/// Each request opens its own [`GatewaySession`]; the gateway only keeps a
/// count of connections not yet shut down so leaks are observable.
#[derive(Clone)]
pub struct PersistenceGateway {
    store: Arc<dyn QuoteStore>,
    schema_budget: Duration,
    insert_budget: Duration,
    live: Arc<AtomicUsize>,
}

impl PersistenceGateway {
    pub fn new(store: Arc<dyn QuoteStore>, schema_budget: Duration, insert_budget: Duration) -> Self {
        Self {
            store,
            schema_budget,
            insert_budget,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of backend connections opened and not yet shut down.
    pub fn open_connections(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Acquires a connection for the lifetime of one request, bounded by `ctx`.
    #[instrument(skip_all, level = "debug")]
    pub async fn open(&self, ctx: &RequestContext) -> Result<GatewaySession, StorageError> {
        let conn = ctx.run(self.store.connect()).await??;

        self.live.fetch_add(1, Ordering::AcqRel);
        debug!(open = self.open_connections(), "store connection acquired");

        Ok(GatewaySession {
            held: Some(Held {
                conn,
                _lease: Lease(Arc::clone(&self.live)),
            }),
            schema_budget: self.schema_budget,
            insert_budget: self.insert_budget,
        })
    }
}

/// One request's store connection.
///
/// [`GatewaySession::close`] shuts it down in place. A session dropped
/// without closing (the request future itself was dropped) hands its
/// connection to a background task that does the same.
pub struct GatewaySession {
    held: Option<Held>,
    schema_budget: Duration,
    insert_budget: Duration,
}

impl GatewaySession {
    /// Creates the record table if absent, within a fresh schema budget
    /// derived from `ctx`.
    pub async fn ensure_schema(&mut self, ctx: &RequestContext) -> Result<(), StorageError> {
        let stage = ctx.child(self.schema_budget);
        let conn = self.conn()?;
        stage.run(conn.ensure_schema()).await?
    }

    /// Appends `quote` as a new row, within a fresh insert budget derived
    /// from `ctx`.
    pub async fn append_record(
        &mut self,
        ctx: &RequestContext,
        quote: &Quote,
    ) -> Result<(), StorageError> {
        let stage = ctx.child(self.insert_budget);
        let conn = self.conn()?;
        stage.run(conn.append_record(quote)).await?
    }

    /// Shuts the connection down and waits (up to a short grace period) for
    /// the backend to finish with it.
    pub async fn close(mut self) {
        if let Some(held) = self.held.take() {
            held.close().await;
        }
    }

    fn conn(&mut self) -> Result<&mut Box<dyn StoreConnection>, StorageError> {
        self.held
            .as_mut()
            .map(|h| &mut h.conn)
            .ok_or_else(|| StorageError::Backend("store session already closed".into()))
    }
}

impl Drop for GatewaySession {
    fn drop(&mut self) {
        let Some(held) = self.held.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(held.close());
            }
            // No runtime left to drive a close; dropping still releases it.
            Err(_) => drop(held),
        }
    }
}

struct Held {
    conn: Box<dyn StoreConnection>,
    // Dropped only after `conn` has shut down.
    _lease: Lease,
}

impl Held {
    async fn close(self) {
        let Held { conn, _lease } = self;

        match tokio::time::timeout(CLOSE_GRACE, conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "store connection closed with error"),
            Err(_) => warn!(
                grace_ms = CLOSE_GRACE.as_millis() as u64,
                "store connection did not shut down in time"
            ),
        }
    }
}

struct Lease(Arc<AtomicUsize>);

impl Drop for Lease {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
        debug!("store connection released");
    }
}
