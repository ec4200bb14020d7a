use clap::Parser;

use common::{LogTarget, init_tracing};
use cotacao_client::{Cli, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the quote file contents.
    init_tracing("cotacao-client", false, LogTarget::Stderr);

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(contents) => {
            println!("{contents}");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, url = %cli.url, "failed to fetch quote");
            Err(e.into())
        }
    }
}
