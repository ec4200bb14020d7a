use anyhow::Context;
use tokio::net::TcpListener;

use common::{LogTarget, init_tracing};
use cotacao_server::config::ServerConfig;
use cotacao_server::http::{AppState, serve};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing("cotacao-server", is_production, LogTarget::Stdout);

    let cfg = ServerConfig::from_env()?;

    tracing::info!(
        database_url = %cfg.database_url,
        quote_api_url = %cfg.quote_api_url,
        pair = %cfg.quote_pair,
        fetch_ms = cfg.budgets.fetch.as_millis() as u64,
        schema_ms = cfg.budgets.schema.as_millis() as u64,
        insert_ms = cfg.budgets.insert.as_millis() as u64,
        request_timeout_ms = cfg.request_timeout.map(|d| d.as_millis() as u64),
        failure_mode = ?cfg.failure_mode,
        "Starting cotacao server..."
    );

    let state = AppState::from_config(&cfg)?;

    // A bind failure is the one fatal error.
    let listener = TcpListener::bind(cfg.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen_addr))?;

    serve(listener, state).await?;

    Ok(())
}
