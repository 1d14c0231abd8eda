//! Settings loader
//!
//! Builds `Settings` from the settings file and the environment with the
//! `config` crate, then applies command line overrides.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use log::debug;

use crate::common::Result;
use super::defaults;
use super::Settings;

/// Schema-validated configuration REST API for a messaging appliance
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version = crate::VERSION, about, long_about = None)]
pub struct Cli {
    /// Admin API listen address
    #[clap(short, long)]
    pub listen: Option<SocketAddr>,

    /// Settings file (JSON)
    #[clap(long, env = defaults::CONFIG_FILE_ENV)]
    pub config_file: Option<PathBuf>,

    /// Directory for the committed configuration and uploaded files
    #[clap(long)]
    pub data_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[clap(long)]
    pub log_level: Option<String>,

    /// REST prefix, e.g. ima/v1
    #[clap(long)]
    pub admin_prefix: Option<String>,
}

impl Cli {
    /// Apply command line values over loaded settings
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(listen) = self.listen {
            settings.listen = listen;
        }
        if let Some(data_dir) = &self.data_dir {
            settings.data_dir = data_dir.clone();
        }
        if let Some(log_level) = &self.log_level {
            settings.log_level = log_level.clone();
        }
        if let Some(prefix) = &self.admin_prefix {
            settings.admin_prefix = prefix.clone();
        }
    }
}

/// Load and validate settings
///
/// A settings file named on the command line must exist; the default
/// `settings.json` is optional.
pub fn load(cli: &Cli) -> Result<Settings> {
    let (path, required) = match &cli.config_file {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(defaults::DEFAULT_CONFIG_FILE), false),
    };

    let mut settings: Settings = Config::builder()
        .add_source(File::from(path.as_path()).format(FileFormat::Json).required(required))
        .add_source(
            Environment::with_prefix(defaults::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    if path.exists() {
        debug!("Settings loaded from {}", path.display());
    }

    cli.apply(&mut settings);
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use crate::admin::types::Role;
    use crate::common::AppError;

    #[test]
    fn test_cli_parses_overrides() {
        let cli = Cli::try_parse_from([
            "appliance-config-api",
            "--listen",
            "127.0.0.1:9100",
            "--admin-prefix",
            "api/v2",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.listen, Some("127.0.0.1:9100".parse().unwrap()));

        let mut settings = Settings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.prefix(), "api/v2");
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_load_from_file_then_cli() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{
                "server_name": "edge-7",
                "restart_delay_ms": 50,
                "users": [
                    {"name": "root", "password": "s3cret", "role": "Admin"},
                    {"name": "watcher", "password": "w", "role": "Viewer"}
                ]
            }"#,
        )
        .unwrap();

        let cli = Cli {
            config_file: Some(path),
            data_dir: Some(dir.path().join("data")),
            ..Cli::default()
        };
        let settings = load(&cli).unwrap();
        assert_eq!(settings.server_name, "edge-7");
        assert_eq!(settings.restart_delay_ms, 50);
        assert_eq!(settings.users.len(), 2);
        assert_eq!(settings.users[1].role, Role::Viewer);
        assert_eq!(settings.data_dir, dir.path().join("data"));
        assert_eq!(settings.prefix(), defaults::ADMIN_PREFIX);
    }

    #[test]
    fn test_missing_named_file_is_error() {
        let dir = tempdir().unwrap();
        let cli = Cli {
            config_file: Some(dir.path().join("absent.json")),
            ..Cli::default()
        };
        assert!(matches!(load(&cli), Err(AppError::Settings(_))));
    }
}
