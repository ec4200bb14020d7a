use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};

/// What the HTTP handler sends when the pipeline fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureMode {
    /// Status chosen from the error kind plus a JSON error body.
    Explicit,
    /// Write nothing; the client gets the transport's empty `200 OK`.
    Silent,
}

impl FromStr for FailureMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "explicit" => Ok(Self::Explicit),
            "silent" => Ok(Self::Silent),
            other => Err(anyhow!("unknown failure mode '{other}' (expected explicit|silent)")),
        }
    }
}

/// Fixed per-stage budgets. Each is capped by whatever is left of the
/// request's own deadline when the stage starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageBudgets {
    pub fetch: Duration,
    pub schema: Duration,
    pub insert: Duration,
}

impl Default for StageBudgets {
    fn default() -> Self {
        Self {
            fetch: Duration::from_millis(200),
            schema: Duration::from_millis(10),
            insert: Duration::from_millis(10),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub listen_addr: SocketAddr,

    /// sqlx SQLite connection string. The file is created if missing.
    pub database_url: String,

    // =========================
    // Quote provider
    // =========================
    /// Provider base URL; `/json/last/{pair}` is appended.
    pub quote_api_url: String,

    /// Pair path segment, e.g. `USD-BRL`. The response envelope key is the
    /// same string without the dash.
    pub quote_pair: String,

    // =========================
    // Deadlines
    // =========================
    pub budgets: StageBudgets,

    /// Deadline of the inbound request itself. `None` means the request is
    /// bounded only by the client staying connected.
    pub request_timeout: Option<Duration>,

    pub failure_mode: FailureMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: "sqlite://cotacao.db".to_string(),
            quote_api_url: "https://economia.awesomeapi.com.br".to_string(),
            quote_pair: "USD-BRL".to_string(),
            budgets: StageBudgets::default(),
            request_timeout: None,
            failure_mode: FailureMode::Explicit,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; unset keys keep their
    /// defaults, malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("LISTEN_ADDR") {
            cfg.listen_addr = v.parse().with_context(|| format!("invalid LISTEN_ADDR '{v}'"))?;
        }
        if let Some(v) = lookup("DATABASE_URL") {
            cfg.database_url = v;
        }
        if let Some(v) = lookup("QUOTE_API_URL") {
            cfg.quote_api_url = v;
        }
        if let Some(v) = lookup("QUOTE_PAIR") {
            cfg.quote_pair = v;
        }
        if let Some(d) = millis(&lookup, "FETCH_TIMEOUT_MS")? {
            cfg.budgets.fetch = d;
        }
        if let Some(d) = millis(&lookup, "SCHEMA_TIMEOUT_MS")? {
            cfg.budgets.schema = d;
        }
        if let Some(d) = millis(&lookup, "INSERT_TIMEOUT_MS")? {
            cfg.budgets.insert = d;
        }
        cfg.request_timeout = millis(&lookup, "REQUEST_TIMEOUT_MS")?;
        if let Some(v) = lookup("FAILURE_MODE") {
            cfg.failure_mode = v.parse()?;
        }

        Ok(cfg)
    }
}

fn millis<F>(lookup: &F, key: &str) -> anyhow::Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| {
            v.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .with_context(|| format!("invalid {key} '{v}' (expected milliseconds)"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_the_provider_and_stage_budgets() {
        let cfg = ServerConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(cfg.listen_addr.port(), 8080);
        assert_eq!(cfg.quote_pair, "USD-BRL");
        assert_eq!(cfg.budgets.fetch, Duration::from_millis(200));
        assert_eq!(cfg.budgets.schema, Duration::from_millis(10));
        assert_eq!(cfg.budgets.insert, Duration::from_millis(10));
        assert_eq!(cfg.request_timeout, None);
        assert_eq!(cfg.failure_mode, FailureMode::Explicit);
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("LISTEN_ADDR", "127.0.0.1:9090"),
            ("DATABASE_URL", "sqlite://other.db"),
            ("FETCH_TIMEOUT_MS", "500"),
            ("REQUEST_TIMEOUT_MS", "2000"),
            ("FAILURE_MODE", "Silent"),
        ]))
        .unwrap();

        assert_eq!(cfg.listen_addr, "127.0.0.1:9090".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.database_url, "sqlite://other.db");
        assert_eq!(cfg.budgets.fetch, Duration::from_millis(500));
        assert_eq!(cfg.budgets.schema, Duration::from_millis(10));
        assert_eq!(cfg.request_timeout, Some(Duration::from_secs(2)));
        assert_eq!(cfg.failure_mode, FailureMode::Silent);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[("SCHEMA_TIMEOUT_MS", "ten")])).unwrap_err();
        assert!(err.to_string().contains("SCHEMA_TIMEOUT_MS"));

        assert!(ServerConfig::from_lookup(lookup(&[("FAILURE_MODE", "loud")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("LISTEN_ADDR", "nowhere")])).is_err());
    }
}
