//! wildsnap server binary

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use wildsnap::services::{HttpClassifier, HttpSummarizer};
use wildsnap::{build_router, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting wildsnap v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::resolve().map_err(|e| anyhow::anyhow!("{}", e))?;
    info!("Database: {}", config.database_path.display());
    info!("Upload directory: {}", config.upload_dir.display());

    std::fs::create_dir_all(&config.upload_dir)?;

    let pool = wildsnap::db::init_database_pool(&config.database_path).await?;
    info!("Database connection established");

    let classifier = Arc::new(
        HttpClassifier::new(config.classifier_url.clone(), config.collaborator_timeout)
            .map_err(|e| anyhow::anyhow!("classifier client: {}", e))?,
    );
    let summarizer = Arc::new(
        HttpSummarizer::new(
            config.summary_api_url.clone(),
            config.summary_api_key.clone(),
            config.summary_model.clone(),
            config.collaborator_timeout,
        )
        .map_err(|e| anyhow::anyhow!("summarizer client: {}", e))?,
    );

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(pool, config, classifier, summarizer);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("wildsnap listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
