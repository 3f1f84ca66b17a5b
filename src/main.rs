use clap::Parser;
use presence_cam::camera;
use presence_cam::sensors::{self, DistanceSensor, SensorParams};
use presence_cam::storage::StorageManager;
use presence_cam::{AppConfig, Controller, logging};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Presence-triggered recording controller.
#[derive(Debug, Parser)]
#[command(name = "presence_cam", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level)?;

    let config = AppConfig::load(&args.config)?;
    info!(config = %args.config.display(), "configuration loaded");

    let recorder = camera::build_recorder(&config)?;
    let storage = Arc::new(StorageManager::new(
        config.service.output_dir.clone(),
        config.min_free_bytes(),
    ));
    let sensor = DistanceSensor::connect(
        sensors::build_device(&config.sensor),
        SensorParams::from_config(&config.sensor),
    )
    .await?;

    let controller = Controller::new(recorder, storage, config.inactivity())
        .with_vision(config.motion.frame_diff())
        .with_status_interval(config.status_interval())
        .with_distance_feed(sensor.subscribe());

    controller.run_until(sensor.events(), shutdown_signal()).await?;
    info!("controller stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}
