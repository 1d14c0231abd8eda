//! Appliance Configuration API: schema-validated configuration objects over REST
//!
//! This library implements the configuration service of a messaging
//! appliance. Clients read and change typed configuration objects
//! (`Forwarder`, `Connection`, `SecurityProfile`, certificates, ...) as JSON
//! below `/<prefix>/config`, and run service operations (status, restart,
//! import, export) below `/<prefix>/service`.
//!
//! # Main Features
//!
//! - A schema registry declaring every object type, its key shape and the
//!   type, range, length and null policy of each property
//! - A validator that turns every rejected request into exactly one
//!   `CWLNA####` error and leaves the committed configuration untouched
//! - A versioned, persisted configuration store with a single
//!   validate-then-commit entry point
//! - Restart, maintenance mode, reset-config and password-sealed
//!   import/export
//!
//! # Example
//!
//! ```no_run
//! use appliance_config_api::admin::{build_router, AdminServerConfig, AppState};
//! use appliance_config_api::settings::Settings;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::default();
//!     let state = AppState::open(&settings)?;
//!     let app = build_router(&AdminServerConfig::from_settings(&settings), state);
//!
//!     let listener = tokio::net::TcpListener::bind(settings.listen).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

// Public modules
pub mod admin;
pub mod common;
pub mod schema;
pub mod service;
pub mod settings;
pub mod store;
pub mod validate;

// Re-export commonly used structures and functions for convenience
pub use common::{AppError, Result};
pub use schema::SchemaRegistry;
pub use store::ConfigStore;
pub use validate::{ConfigError, ConfigResult};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// REST API version reported in configuration documents
pub const API_VERSION: &str = "v1";
