//! Appliance Configuration API server
//!
//! This binary is the command-line entry point: it loads the process
//! settings, opens the configuration store and serves the REST API until
//! Ctrl-C.

use clap::Parser;
use log::info;

// Import our library
use appliance_config_api::{VERSION, APP_NAME};
use appliance_config_api::admin::{start_admin_server, AdminServerConfig, AppState};
use appliance_config_api::common::{init_logger, AppError, Result};
use appliance_config_api::settings::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Settings decide the log level, so they load before the logger
    let settings = settings::load(&cli)?;
    init_logger(&settings.log_level);

    info!("Starting {} v{}", APP_NAME, VERSION);
    info!("Data directory: {}", settings.data_dir.display());

    let state = AppState::open(&settings).map_err(|e| AppError::Server(e.to_string()))?;
    let snapshot = state.store.snapshot()?;
    info!(
        "Configuration version {} loaded, {} users configured",
        snapshot.version,
        settings.users.len()
    );

    let config = AdminServerConfig::from_settings(&settings);
    start_admin_server(config, state)
        .await
        .map_err(|e| AppError::Server(e.to_string()))?;

    Ok(())
}
