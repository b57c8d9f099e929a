use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::NaiveTime;

/// Application-level constants
pub const APP_NAME: &str = "HIS";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default listen address for the HTTP server.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Appointment grid step in minutes.
pub const DEFAULT_SLOT_GRANULARITY_MINUTES: u32 = 30;
/// Appointment length when the caller gives none.
pub const DEFAULT_APPOINTMENT_DURATION_MINUTES: u32 = 30;
/// Durations an appointment may be booked for.
pub const ALLOWED_APPOINTMENT_DURATIONS: [u32; 4] = [15, 30, 45, 60];

/// First bookable start time of the working day.
pub fn working_day_start() -> NaiveTime {
    NaiveTime::MIN + chrono::Duration::hours(8)
}

/// Exclusive end of the working day. Appointments must start before it.
pub fn working_day_end() -> NaiveTime {
    NaiveTime::MIN + chrono::Duration::hours(17)
}

/// Get the application data directory
/// ~/HIS/ on all platforms; falls back to the working directory when no
/// home directory can be resolved.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default SQLite database location.
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("his.db")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "his_core=info,tower_http=warn"
}

/// Server settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid HIS_BIND_ADDR '{0}'")]
    InvalidBindAddr(String),
}

impl ServerConfig {
    /// `HIS_BIND_ADDR` (default 127.0.0.1:8080) and `HIS_DB_PATH`
    /// (default `~/HIS/his.db`).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(
            std::env::var("HIS_BIND_ADDR").ok(),
            std::env::var("HIS_DB_PATH").ok(),
        )
    }

    fn from_vars(bind: Option<String>, db_path: Option<String>) -> Result<Self, ConfigError> {
        let bind = bind.unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBindAddr(bind.clone()))?;
        Ok(Self {
            bind_addr,
            db_path: db_path.map(PathBuf::from).unwrap_or_else(default_db_path),
        })
    }
}
