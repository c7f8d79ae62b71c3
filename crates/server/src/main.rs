use anyhow::Context;
use beqwatch_core::config::Config;
use beqwatch_server::routes::build_router;
use beqwatch_server::startup::{build_collaborators, discover_devices};
use beqwatch_server::state::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();
    let collaborators = build_collaborators(&config);

    let devices = match collaborators.profiles.as_deref() {
        Some(profiles) => discover_devices(profiles, &config.ezbeq).await,
        None => Vec::new(),
    };
    info!(count = devices.len(), "ezBEQ devices discovered");

    let hdmi = &config.hdmi_sync;
    if hdmi.enabled {
        info!(source = %hdmi.source, entity = %hdmi.entity, "HDMI sync enabled");
    }

    let state = AppState::start(&config, collaborators, devices);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    info!(addr = %config.server.bind, "server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
