//! Wire shapes of the quote provider. Field names here follow the provider's
//! JSON exactly; nothing outside this module sees them.

use std::collections::HashMap;

use serde::Deserialize;

use crate::model::Quote;

/// `{ "USDBRL": { ... } }`, keyed by the concatenated pair.
pub type QuoteEnvelope = HashMap<String, ApiQuote>;

#[derive(Debug, Deserialize)]
pub struct ApiQuote {
    pub code: String,
    pub codein: String,
    pub name: String,
    pub high: String,
    pub low: String,
    #[serde(rename = "varBid")]
    pub var_bid: String,
    #[serde(rename = "pctChange")]
    pub pct_change: String,
    pub bid: String,
    pub ask: String,
    pub timestamp: String,
    pub create_date: String,
}

impl From<ApiQuote> for Quote {
    fn from(q: ApiQuote) -> Self {
        Quote {
            code: q.code,
            codein: q.codein,
            name: q.name,
            high: q.high,
            low: q.low,
            var_bid: q.var_bid,
            pct_change: q.pct_change,
            bid: q.bid,
            ask: q.ask,
            timestamp: q.timestamp,
            create_date: q.create_date,
        }
    }
}

/// Envelope key for a pair path segment: `USD-BRL` -> `USDBRL`.
pub fn envelope_key(pair: &str) -> String {
    pair.chars().filter(|c| *c != '-').collect()
}
