/// One exchange-rate observation.
///
/// Every field is carried verbatim from the provider; nothing is parsed or
/// validated. A `Quote` is built once by the source adapter, moved into the
/// pipeline, and only ever borrowed after that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    /// Base currency code, e.g. `USD`.
    pub code: String,
    /// Quote currency code, e.g. `BRL`.
    pub codein: String,
    pub name: String,
    pub high: String,
    pub low: String,
    /// Absolute variation.
    pub var_bid: String,
    /// Percent variation.
    pub pct_change: String,
    pub bid: String,
    pub ask: String,
    /// Provider observation time (unix seconds, as text).
    pub timestamp: String,
    pub create_date: String,
}
