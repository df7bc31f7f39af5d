mod bootstrap;
mod health;

use anyhow::Result;
use deplo_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use deplo_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // kube and lapin both reach rustls; pin one process-wide provider
    let _ = rustls::crypto::ring::default_provider().install_default();
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.listener.status(),
    )
    .await?;

    let listener = app.listener;
    let consumer = tokio::spawn(async move { listener.start().await });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        queue = %app.config.queue.name,
        namespace = %app.pipeline.environment().namespace,
        "deplo-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "deplo-server stopping"
    );

    consumer.abort();
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
