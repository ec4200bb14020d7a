//! Quote Source Adapter: one bounded GET against the quote provider.

pub mod client;
pub mod errors;
pub mod types;

use async_trait::async_trait;

pub use client::AwesomeApiClient;
pub use errors::SourceError;

use crate::deadline::RequestContext;
use crate::model::Quote;

/// Something that can produce the current quote within a context's deadline.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch(&self, ctx: &RequestContext) -> Result<Quote, SourceError>;
}
