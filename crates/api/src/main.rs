use std::sync::Arc;

use anyhow::Context;

use tradedesk_api::app::{build_app, services};
use tradedesk_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tradedesk_observability::init();

    let config = ApiConfig::from_env();
    let session_secret = config.session_secret.clone().unwrap_or_else(|| {
        tracing::warn!("SESSION_SECRET not set; using insecure dev default");
        "dev-secret".to_string()
    });

    let store = services::build_store(config.database_url.as_deref())
        .await
        .context("failed to open account store")?;
    let services = Arc::new(services::AppServices::new(store, config.bouncer.clone()));
    let app = build_app(session_secret, services);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
