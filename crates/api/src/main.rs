use anyhow::Context;

use smis_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    smis_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let app = smis_api::app::build_app(&config)
        .await
        .context("failed to initialize services")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
