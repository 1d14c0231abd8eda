//! Process settings
//!
//! Settings configure the process itself (listen address, data directory,
//! users), as opposed to the appliance configuration objects served by the
//! API. They are layered with the `config` crate:
//! 1. Default values (lowest priority)
//! 2. Settings file (`settings.json` by default)
//! 3. Environment variables (`APPLIANCE_CONFIG_*`)
//! 4. Command line arguments (highest priority)

pub mod defaults;
mod loader;

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::admin::types::{Role, UserAccount};
use crate::common::{AppError, Result};

pub use loader::{load, Cli};

/// Process settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Admin API listen address
    pub listen: SocketAddr,

    /// REST prefix, without surrounding slashes
    pub admin_prefix: String,

    /// Directory holding the committed configuration and uploaded files
    pub data_dir: PathBuf,

    /// Audit log path; `<data_dir>/audit.jsonl` when unset
    pub audit_log: Option<PathBuf>,

    /// Time a restart spends in the `Restarting` state
    pub restart_delay_ms: u64,

    /// Log level
    pub log_level: String,

    /// Server name reported by `service/status`
    pub server_name: String,

    /// Basic-auth users
    pub users: Vec<UserAccount>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen: defaults::listen(),
            admin_prefix: defaults::ADMIN_PREFIX.to_string(),
            data_dir: defaults::data_dir(),
            audit_log: None,
            restart_delay_ms: defaults::RESTART_DELAY_MS,
            log_level: defaults::LOG_LEVEL.to_string(),
            server_name: defaults::SERVER_NAME.to_string(),
            users: vec![UserAccount {
                name: "admin".to_string(),
                password: "admin".to_string(),
                role: Role::Admin,
            }],
        }
    }
}

impl Settings {
    /// Prefix with surrounding slashes removed
    pub fn prefix(&self) -> &str {
        self.admin_prefix.trim_matches('/')
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.audit_log
            .clone()
            .unwrap_or_else(|| self.data_dir.join("audit.jsonl"))
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    /// Check the settings are usable
    pub fn validate(&self) -> Result<()> {
        if self.prefix().is_empty() {
            return Err(AppError::InvalidSettings("admin_prefix must not be empty".to_string()));
        }
        if !self.users.iter().any(|u| u.role == Role::Admin) {
            return Err(AppError::InvalidSettings("at least one Admin user is required".to_string()));
        }
        if let Some(user) = self.users.iter().find(|u| u.name.is_empty() || u.name.contains(':')) {
            return Err(AppError::InvalidSettings(format!("invalid user name '{}'", user.name)));
        }
        if self.restart_delay_ms > defaults::MAX_RESTART_DELAY_MS {
            return Err(AppError::InvalidSettings(format!(
                "restart_delay_ms must be at most {}",
                defaults::MAX_RESTART_DELAY_MS
            )));
        }
        if !defaults::LOG_LEVELS.iter().any(|level| level.eq_ignore_ascii_case(&self.log_level)) {
            return Err(AppError::InvalidSettings(format!("unknown log level '{}'", self.log_level)));
        }
        Ok(())
    }
}
