use std::sync::Arc;

use anyhow::Context;

use doctrack_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    doctrack_observability::init(config.log_format);
    tracing::info!(?config, "starting doctrack-api");
    if config.uses_default_secret() {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
    }

    let services = doctrack_api::app::services::build_services(&config)
        .await
        .context("failed to initialise services")?;
    let app = doctrack_api::app::build_app(Arc::new(services), &config.cors_origin);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
