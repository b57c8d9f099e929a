pub mod admission; // Admission lifecycle + nursing notes
pub mod api; // HTTP surface
pub mod appointment; // Appointment scheduling
pub mod authorization; // Staff RBAC
pub mod bed_allocation; // Bed register + allocation
pub mod config;
pub mod core_state;
pub mod db;
pub mod dispensing; // Pharmacy stock + dispensing transaction
pub mod models;
pub mod slots; // Slot availability

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::api::ServerError;
use crate::config::ServerConfig;
use crate::core_state::CoreState;

/// Install the global `tracing` subscriber. `RUST_LOG` wins over the
/// built-in default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Start the server and block until Ctrl-C.
pub async fn run() -> Result<(), ServerError> {
    init_tracing();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let server_config = ServerConfig::from_env()?;

    let core = Arc::new(CoreState::new(server_config.db_path.clone()));
    core.initialize()?;

    {
        let conn = core.open_db()?;
        if let Some(token) = api::bootstrap_admin(&conn)? {
            println!("Bootstrap admin token (shown once): {token}");
        }
    }

    let mut server = api::start_server(core, server_config.bind_addr).await?;
    tracing::info!(addr = %server.addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
    }
    server.shutdown();
    server.wait().await;
    Ok(())
}
