use anyhow::Context;

use goodsin_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    goodsin_observability::init_with(config.log_format);

    if config.insecure_jwt_secret {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
    }

    let app = goodsin_api::app::build_app_with(&config)?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
