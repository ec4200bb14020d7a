use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "cotacao-client", version)]
pub struct Cli {
    /// Quote server endpoint
    #[arg(long, default_value = "http://localhost:8080")]
    pub url: String,

    /// Deadline for the whole GET, in milliseconds
    #[arg(long, default_value_t = 300)]
    pub timeout_ms: u64,

    /// File the labelled bid is written to (truncated)
    #[arg(long, default_value = "cotacao.txt")]
    pub output: PathBuf,

    /// Text written before the bid
    #[arg(long, default_value = "Dólar: ")]
    pub label: String,
}

impl Cli {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
