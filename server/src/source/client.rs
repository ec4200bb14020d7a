use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use super::QuoteSource;
use super::errors::SourceError;
use super::types::{QuoteEnvelope, envelope_key};
use crate::deadline::RequestContext;
use crate::model::Quote;

/// HTTP client for the AwesomeAPI `json/last` endpoint.
#[derive(Clone)]
pub struct AwesomeApiClient {
    http: Client,
    url: String,
    pair: String,
    key: String,
}

impl AwesomeApiClient {
    /// `url` is the provider base (no trailing path), `pair` a path segment
    /// such as `USD-BRL`.
    pub fn new(url: String, pair: String) -> Result<Self, SourceError> {
        // No client-wide timeout: every call is bounded by its context.
        let http = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        let key = envelope_key(&pair);

        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            pair,
            key,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/json/last/{}", self.url, self.pair)
    }
}

#[async_trait]
impl QuoteSource for AwesomeApiClient {
    #[instrument(skip(self, ctx), fields(pair = %self.pair), level = "debug")]
    async fn fetch(&self, ctx: &RequestContext) -> Result<Quote, SourceError> {
        // The deadline rides on the request; cancellation is the caller's
        // `RequestContext::run`, which drops this future.
        let mut req = self.http.get(self.endpoint());
        if let Some(remaining) = ctx.remaining() {
            req = req.timeout(remaining);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status(status));
        }
        let body = resp.bytes().await?;

        let quote = decode_quote(&body, &self.key)?;

        debug!(bid = %quote.bid, ask = %quote.ask, "quote fetched");

        Ok(quote)
    }
}

/// Decodes a provider body and extracts the entry for `key` (e.g. `USDBRL`).
pub fn decode_quote(body: &[u8], key: &str) -> Result<Quote, SourceError> {
    let mut envelope: QuoteEnvelope = serde_json::from_slice(body)?;

    envelope
        .remove(key)
        .map(Quote::from)
        .ok_or_else(|| SourceError::MissingPair(key.to_string()))
}
