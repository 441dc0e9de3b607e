use anyhow::Context;

use webhooks_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    webhooks_observability::init();

    let config = ApiConfig::from_env()?;
    let (services, pool) = webhooks_api::app::services::build_services(&config).await?;
    let app = webhooks_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
