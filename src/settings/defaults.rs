//! Default settings values
//!
//! Single source of truth for process defaults.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Environment variable prefix for all settings
pub const ENV_PREFIX: &str = "APPLIANCE_CONFIG";

/// Environment variable naming the settings file
pub const CONFIG_FILE_ENV: &str = "APPLIANCE_CONFIG_FILE";

/// Default settings file name
pub const DEFAULT_CONFIG_FILE: &str = "settings.json";

/// Default admin API port
pub const ADMIN_PORT: u16 = 9089;

/// Default REST prefix below which `config`, `service` and `file` live
pub const ADMIN_PREFIX: &str = "ima/v1";

/// Default data directory
pub const DATA_DIR: &str = "data";

/// Default log level
pub const LOG_LEVEL: &str = "info";

/// Default delay a restart spends in the `Restarting` state
pub const RESTART_DELAY_MS: u64 = 2000;

/// Upper bound for the restart delay
pub const MAX_RESTART_DELAY_MS: u64 = 600_000;

/// Default server name reported by `service/status`
pub const SERVER_NAME: &str = "appliance";

/// Accepted log levels
pub const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

pub fn listen() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, ADMIN_PORT))
}

pub fn data_dir() -> PathBuf {
    PathBuf::from(DATA_DIR)
}
