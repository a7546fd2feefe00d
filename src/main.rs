use clap::Parser;
use tracing_subscriber::EnvFilter;

use erp_api::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real deployments set the environment directly
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("erp_api=info,tower_http=info")),
        )
        .init();

    cli::run(Cli::parse()).await
}
