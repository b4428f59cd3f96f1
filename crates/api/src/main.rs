use std::env;

use anyhow::Result;
use tripsmith_api::config::DEFAULT_BIND;
use tripsmith_api::{build_app, ApiConfig};
use tripsmith_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("tripsmith_api");

    let bind = env::var("TRIPSMITH_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let app = build_app(ApiConfig::from_env()).await?;

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(bind = %bind, "tripsmith api started");

    axum::serve(listener, app).await?;
    Ok(())
}
