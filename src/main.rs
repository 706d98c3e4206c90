use leasewarden::{
    config::EngineConfig,
    observability::{init_observability, log_config_info},
    LeaseEngine, APP_NAME, VERSION,
};
use tokio::signal;
use tracing::{error, info};

fn install_rustls_provider() -> anyhow::Result<()> {
    use rustls::crypto::{ring, CryptoProvider};

    if CryptoProvider::get_default().is_none() {
        ring::default_provider()
            .install_default()
            .map_err(|_| anyhow::anyhow!("failed to install ring crypto provider"))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    install_rustls_provider()?;

    // Load .env file if it exists (optional - won't fail if missing)
    // This must happen before any config is read from environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let config = EngineConfig::from_env()?;
    init_observability(&config.observability);

    info!(app_name = APP_NAME, version = VERSION, "Starting lease engine");
    log_config_info(&config);

    let engine = LeaseEngine::start(config).await.map_err(|e| {
        error!(error = %e, "Lease engine failed to start");
        e
    })?;

    match engine.handle().query("SELECT current_user").await {
        Ok(rows) => info!(rows = rows.len(), "Connection check query succeeded"),
        Err(e) => error!(error = %e, "Connection check query failed"),
    }

    info!("Monitoring lease renewal (press Ctrl+C to exit)");
    signal::ctrl_c().await?;
    info!("Shutdown signal received");

    engine.shutdown().await?;
    Ok(())
}
