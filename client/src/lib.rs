//! Consumer of the quote server: GET the bid, write it to a file with a
//! label, read the file back.

pub mod cli;
pub mod error;

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};

pub use cli::Cli;
pub use error::ClientError;

#[derive(Clone)]
pub struct QuoteClient {
    http: Client,
    url: String,
}

impl QuoteClient {
    /// `timeout` bounds the whole exchange, connect to body.
    pub fn new(url: String, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url })
    }

    /// Fetches the bid; the server answers it as a JSON string.
    #[instrument(skip(self), fields(url = %self.url), level = "debug")]
    pub async fn fetch_bid(&self) -> Result<String, ClientError> {
        let resp = self.http.get(&self.url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status(status));
        }

        let bid: String = resp.json().await?;
        debug!(bid = %bid, "bid received");

        Ok(bid)
    }
}

/// Writes `label` + `bid` to `path`, replacing any previous content.
pub async fn write_quote_file(path: &Path, label: &str, bid: &str) -> Result<(), ClientError> {
    tokio::fs::write(path, format!("{label}{bid}"))
        .await
        .map_err(|source| ClientError::Io {
            path: path.to_path_buf(),
            source,
        })
}

pub async fn read_quote_file(path: &Path) -> Result<String, ClientError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ClientError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Full client flow. Returns what was read back from the output file.
pub async fn run(cli: &Cli) -> Result<String, ClientError> {
    let client = QuoteClient::new(cli.url.clone(), cli.timeout())?;

    let bid = client.fetch_bid().await?;
    write_quote_file(&cli.output, &cli.label, &bid).await?;

    read_quote_file(&cli.output).await
}
