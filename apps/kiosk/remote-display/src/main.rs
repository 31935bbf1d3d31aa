use remote_display::app::Kiosk;
use remote_display::error::RemoteDisplayError;
use remote_display::logger::initialize as LoggerInitialize;

use common::ErrorLocation;
use display_core::config::DisplayConfig;

use std::fs::create_dir_all;
use std::panic::Location;
use std::process::ExitCode;

use log::{error, info, warn};

const LOG_DIR_NAME: &str = "logs";

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), RemoteDisplayError> {
    // A missing .env is normal
    let dotenv = dotenvy::dotenv();

    let config_dir = DisplayConfig::config_dir()?;
    let config = DisplayConfig::load_effective(&config_dir)?;

    let log_dir = config_dir.join(LOG_DIR_NAME);
    create_dir_all(&log_dir).map_err(|e| RemoteDisplayError::RemoteDisplay {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&log_dir, config.log_level())?;

    info!("Remote display starting");
    info!("Config directory: {}", config_dir.display());
    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let kiosk = Kiosk::from_config(&config)?;
    kiosk.start().await?;

    shutdown_signal().await;

    kiosk.shutdown().await;
    info!("Remote display stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Cannot listen for SIGTERM: {e}"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {e}");
    }
}
