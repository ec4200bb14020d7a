//! Transport entrypoint: a single `GET /` route in front of the pipeline.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use common::{TraceId, root_span};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{Instrument, info};

use crate::config::{FailureMode, ServerConfig};
use crate::deadline::RequestContext;
use crate::error::{ErrorKind, PipelineError, Stage};
use crate::pipeline::QuotePipeline;
use crate::source::AwesomeApiClient;
use crate::store::{PersistenceGateway, SqliteQuoteStore};

/// Shared state for the handler. Holds no per-request data.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<QuotePipeline>,
    failure_mode: FailureMode,
    request_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(
        pipeline: Arc<QuotePipeline>,
        failure_mode: FailureMode,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            pipeline,
            failure_mode,
            request_timeout,
        }
    }

    /// Wires the production source and SQLite store from `cfg`.
    pub fn from_config(cfg: &ServerConfig) -> anyhow::Result<Self> {
        let source = AwesomeApiClient::new(cfg.quote_api_url.clone(), cfg.quote_pair.clone())?;
        let busy_timeout = cfg.budgets.schema.min(cfg.budgets.insert);
        let store = SqliteQuoteStore::new(&cfg.database_url, busy_timeout)?;
        let gateway = PersistenceGateway::new(Arc::new(store), cfg.budgets.schema, cfg.budgets.insert);
        let pipeline = QuotePipeline::new(Arc::new(source), gateway, cfg.budgets.fetch);

        Ok(Self::new(
            Arc::new(pipeline),
            cfg.failure_mode,
            cfg.request_timeout,
        ))
    }

    pub fn pipeline(&self) -> &QuotePipeline {
        &self.pipeline
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(get_quote))
        .with_state(state)
}

/// Serves until the listener fails. There is no graceful shutdown.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "quote server listening");
    axum::serve(listener, create_router(state)).await
}

/// `GET /`: runs the pipeline and answers with the bid as a JSON string.
async fn get_quote(State(state): State<AppState>) -> Response {
    let trace_id = TraceId::new();
    let ctx = RequestContext::rooted(state.request_timeout);

    // hyper drops this future when the client goes away; the guard turns that
    // into cancellation of every stage context.
    let _cancel_on_drop = ctx.drop_guard();

    let outcome = state
        .pipeline
        .run(&ctx)
        .instrument(root_span("quote_request", &trace_id))
        .await;

    match outcome {
        Ok(quote) => (StatusCode::OK, Json(quote.bid)).into_response(),
        Err(e) => failure_response(state.failure_mode, &e),
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

fn failure_response(mode: FailureMode, err: &PipelineError) -> Response {
    match mode {
        FailureMode::Silent => StatusCode::OK.into_response(),
        FailureMode::Explicit => {
            let body = ErrorBody {
                error: ErrorDetail {
                    stage: err.stage(),
                    kind: err.kind(),
                    message: err.to_string(),
                },
            };
            (status_for(err), Json(body)).into_response()
        }
    }
}

/// Status used in explicit failure mode.
pub fn status_for(err: &PipelineError) -> StatusCode {
    match err.kind() {
        ErrorKind::Transport if err.is_deadline() => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Transport | ErrorKind::Decode => StatusCode::BAD_GATEWAY,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
