//! Quote Pipeline Handler.
//!
//! Per request, strictly in order:
//! connect -> fetch -> ensure schema -> append record.
//!
//! Every stage gets its own budget derived from the request context live at
//! that moment, so a slow fetch never eats into the store budgets. The store
//! session is opened first and closed on every exit path; if the request
//! future itself is dropped, the session closes in the background.

use std::sync::Arc;
use std::time::Duration;

use common::{child_span, warn_if_slow};
use tracing::{Instrument, error, info};

use crate::deadline::RequestContext;
use crate::error::{PipelineError, Stage};
use crate::model::Quote;
use crate::source::{QuoteSource, SourceError};
use crate::store::{GatewaySession, PersistenceGateway};

pub struct QuotePipeline {
    source: Arc<dyn QuoteSource>,
    gateway: PersistenceGateway,
    fetch_budget: Duration,
}

impl QuotePipeline {
    pub fn new(source: Arc<dyn QuoteSource>, gateway: PersistenceGateway, fetch_budget: Duration) -> Self {
        Self {
            source,
            gateway,
            fetch_budget,
        }
    }

    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    /// Runs one request through every stage and returns the persisted quote.
    ///
    /// Failures are logged here with the failing stage; callers only decide
    /// what to answer.
    pub async fn run(&self, ctx: &RequestContext) -> Result<Quote, PipelineError> {
        match self.run_stages(ctx).await {
            Ok(quote) => {
                info!(bid = %quote.bid, create_date = %quote.create_date, "quote persisted");
                Ok(quote)
            }
            Err(e) => {
                error!(
                    stage = %e.stage(),
                    kind = ?e.kind(),
                    deadline = e.is_deadline(),
                    error = %e,
                    "quote pipeline failed"
                );
                Err(e)
            }
        }
    }

    async fn run_stages(&self, ctx: &RequestContext) -> Result<Quote, PipelineError> {
        let mut session = self
            .gateway
            .open(ctx)
            .instrument(child_span("connect"))
            .await
            .map_err(|e| PipelineError::storage(Stage::Connect, e))?;

        let outcome = self.fetch_and_persist(&mut session, ctx).await;

        // The connection is shut down before the request answers, on success
        // and failure alike.
        session.close().instrument(child_span("close")).await;

        outcome
    }

    async fn fetch_and_persist(
        &self,
        session: &mut GatewaySession,
        ctx: &RequestContext,
    ) -> Result<Quote, PipelineError> {
        // Sources are not trusted to honour the context themselves, so the
        // budget is enforced here.
        let fetch_ctx = ctx.child(self.fetch_budget);
        let quote = warn_if_slow(
            "fetch",
            self.fetch_budget,
            fetch_ctx.run(self.source.fetch(&fetch_ctx)),
        )
        .instrument(child_span("fetch"))
        .await
        .unwrap_or_else(|i| Err(SourceError::from(i)))?;

        session
            .ensure_schema(ctx)
            .instrument(child_span("schema"))
            .await
            .map_err(|e| PipelineError::storage(Stage::Schema, e))?;

        session
            .append_record(ctx, &quote)
            .instrument(child_span("persist"))
            .await
            .map_err(|e| PipelineError::storage(Stage::Persist, e))?;

        Ok(quote)
    }
}
