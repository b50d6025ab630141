use std::sync::Arc;

use anyhow::Context;

use gatekeep_api::{app, config::ApiConfig, refresh_worker::RefreshWorker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gatekeep_observability::init();

    let config = ApiConfig::from_env()?;
    let services = Arc::new(app::build_services(&config).await?);

    let worker = RefreshWorker::new(services.authorizer.clone(), config.refresh_interval);
    let stop_worker = worker.shutdown_handle();
    let worker_handle = worker.start();

    let router = app::build_app(services.clone());
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .context("serve http")?;

    stop_worker.notify_one();
    let _ = worker_handle.await;
    services.authorizer.cache().close();
    Ok(())
}
