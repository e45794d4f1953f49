use anyhow::{Context, Result};
use breathe::config::load_config_or_default;
use breathe::{AqiCalculator, BreakpointTable, ZoneRegistry, ZoneService};
use breathe_providers::{AirGradientSource, OpenMeteoSource, RefreshScheduler};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Provider tokens usually live in .env
    dotenv::dotenv().ok();

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "breathe=info,breathe_providers=info".into()),
        )
        .init();

    info!("Breathe refresher starting...");

    let config_path =
        std::env::var("BREATHE_CONFIG").unwrap_or_else(|_| "breathe.toml".to_string());
    let config = load_config_or_default(&config_path)?;

    info!(
        config_path = %config_path,
        refresh_timeout_secs = config.cache.refresh_timeout_seconds,
        min_reporting = config.sensors.min_reporting,
        interval_minutes = config.refresh.interval_minutes,
        "Configuration loaded"
    );

    let breakpoints_path = Path::new(&config.data.breakpoints_path);
    let table = if breakpoints_path.exists() {
        BreakpointTable::load(breakpoints_path)?
    } else {
        warn!(
            path = %breakpoints_path.display(),
            "Breakpoint table not found, using built-in national table"
        );
        BreakpointTable::national().context("Built-in breakpoint table is invalid")?
    };
    info!(pollutants = table.pollutants().count(), "Breakpoint table loaded");

    let registry = Arc::new(
        ZoneRegistry::load(&config.data.zones_path).context("Failed to load zone registry")?,
    );
    info!(zones = registry.len(), "Zone registry loaded");

    let open_meteo = Arc::new(OpenMeteoSource::new()?);
    let air_gradient =
        Arc::new(AirGradientSource::new()?.with_gas_supplement(Arc::clone(&open_meteo)));

    let service = Arc::new(
        ZoneService::new(registry, AqiCalculator::new(Arc::new(table)), &config)
            .with_source(open_meteo)
            .with_source(air_gradient),
    );

    let scheduler = RefreshScheduler::new(service, config.refresh.interval());
    let handle = scheduler.start();

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    handle.abort();
    info!("Breathe refresher stopped");

    Ok(())
}
