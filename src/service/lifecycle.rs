//! Server lifecycle
//!
//! A restart is an out-of-band barrier: the controller flips to
//! `Restarting`, a background task waits out the restart delay, reloads the
//! committed configuration from persistence and then settles into the
//! target state. Callers poll `wait_ready` instead of sleeping blindly.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Serialize;

use crate::store::ConfigStore;
use crate::validate::{ConfigError, ConfigResult};

/// Externally visible server state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServerState {
    Running,
    Maintenance,
    Restarting,
}

impl ServerState {
    /// Numeric state reported by `service/status`
    pub fn code(&self) -> u8 {
        match self {
            ServerState::Running => 1,
            ServerState::Restarting => 2,
            ServerState::Maintenance => 9,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ServerState::Running => "Running (production)",
            ServerState::Maintenance => "Running (maintenance)",
            ServerState::Restarting => "Restarting",
        }
    }
}

/// What a restart does besides restarting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartMode {
    /// Restart into the current mode
    Normal,
    /// Restart into maintenance mode
    EnterMaintenance,
    /// Restart into production mode
    LeaveMaintenance,
    /// Reset to factory configuration, then restart
    ResetConfig,
}

/// `service/status` payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerStatus {
    pub name: String,
    pub state: u8,
    pub state_description: &'static str,
    pub up_time_seconds: i64,
    pub version: &'static str,
    pub config_version: u64,
    pub restart_required: bool,
}

#[derive(Debug)]
struct Lifecycle {
    maintenance: bool,
    restarting: bool,
    restart_required: bool,
    started_at: DateTime<Utc>,
    restarts: u64,
}

impl Lifecycle {
    fn state(&self) -> ServerState {
        if self.restarting {
            ServerState::Restarting
        } else if self.maintenance {
            ServerState::Maintenance
        } else {
            ServerState::Running
        }
    }
}

/// Owns the server state machine
pub struct ServiceController {
    store: Arc<ConfigStore>,
    server_name: String,
    lifecycle: RwLock<Lifecycle>,
    restart_delay: Duration,
    poll_interval: Duration,
}

impl ServiceController {
    pub fn new(store: Arc<ConfigStore>, server_name: impl Into<String>, restart_delay: Duration) -> Self {
        Self {
            store,
            server_name: server_name.into(),
            lifecycle: RwLock::new(Lifecycle {
                maintenance: false,
                restarting: false,
                restart_required: false,
                started_at: Utc::now(),
                restarts: 0,
            }),
            restart_delay,
            poll_interval: Duration::from_millis(25),
        }
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle
            .read()
            .map(|lifecycle| lifecycle.state())
            .unwrap_or(ServerState::Restarting)
    }

    /// Number of completed restarts
    pub fn restarts(&self) -> u64 {
        self.lifecycle.read().map(|lifecycle| lifecycle.restarts).unwrap_or(0)
    }

    /// Fail with `ServerNotAvailable` while a restart is in progress
    pub fn ensure_available(&self) -> ConfigResult<()> {
        match self.state() {
            ServerState::Restarting => Err(ConfigError::ServerNotAvailable),
            _ => Ok(()),
        }
    }

    /// Current status report
    pub fn status(&self) -> ConfigResult<ServerStatus> {
        let lifecycle = self.lifecycle.read().map_err(|_| poisoned())?;
        let state = lifecycle.state();
        let config_version = self.store.snapshot()?.version;

        Ok(ServerStatus {
            name: self.server_name.clone(),
            state: state.code(),
            state_description: state.description(),
            up_time_seconds: (Utc::now() - lifecycle.started_at).num_seconds(),
            version: crate::VERSION,
            config_version,
            restart_required: lifecycle.restart_required,
        })
    }

    /// Enter maintenance mode without a restart, e.g. after an applied import
    pub fn enter_maintenance(&self, restart_required: bool) -> ConfigResult<()> {
        let mut lifecycle = self.lifecycle.write().map_err(|_| poisoned())?;
        lifecycle.maintenance = true;
        lifecycle.restart_required |= restart_required;
        info!("Server entered maintenance mode (restart required: {})", lifecycle.restart_required);
        Ok(())
    }

    /// Begin a restart and return immediately
    ///
    /// Only one restart runs at a time; a second request while restarting
    /// fails with `ServerNotAvailable`.
    pub fn restart(self: &Arc<Self>, mode: RestartMode) -> ConfigResult<()> {
        let maintenance = {
            let mut lifecycle = self.lifecycle.write().map_err(|_| poisoned())?;
            if lifecycle.restarting {
                return Err(ConfigError::ServerNotAvailable);
            }
            lifecycle.restarting = true;
            match mode {
                RestartMode::EnterMaintenance => true,
                RestartMode::LeaveMaintenance => false,
                RestartMode::Normal | RestartMode::ResetConfig => lifecycle.maintenance,
            }
        };

        if mode == RestartMode::ResetConfig {
            if let Err(e) = self.store.reset_to_defaults() {
                if let Ok(mut lifecycle) = self.lifecycle.write() {
                    lifecycle.restarting = false;
                }
                return Err(e);
            }
        }

        info!("Server restarting ({:?})", mode);
        metrics::counter!("server_restarts_total").increment(1);

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(controller.restart_delay).await;
            if let Err(e) = controller.store.reload() {
                error!("Failed to reload configuration during restart: {}", e);
            }
            controller.finish_restart(maintenance);
        });
        Ok(())
    }

    fn finish_restart(&self, maintenance: bool) {
        match self.lifecycle.write() {
            Ok(mut lifecycle) => {
                lifecycle.restarting = false;
                lifecycle.maintenance = maintenance;
                lifecycle.restart_required = false;
                lifecycle.started_at = Utc::now();
                lifecycle.restarts += 1;
                info!("Server is {}", lifecycle.state().description());
            }
            Err(_) => error!("Server lifecycle lock poisoned; restart did not complete"),
        }
    }

    /// Wait until no restart is in progress
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        self.wait_for(|state| state != ServerState::Restarting, timeout).await
    }

    /// Poll the server state until `ready` holds or `timeout` elapses
    pub async fn wait_for<F>(&self, mut ready: F, timeout: Duration) -> bool
    where
        F: FnMut(ServerState) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if ready(self.state()) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn poisoned() -> ConfigError {
    ConfigError::System("server lifecycle lock poisoned".to_string())
}
