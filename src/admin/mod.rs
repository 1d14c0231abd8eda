//! Admin API Module
//!
//! The REST surface of the configuration service:
//! - `config` and `config/<Type>/<Key>...` reads, POSTs and DELETEs
//! - `file/<name>` uploads consumed by certificate objects
//! - `service/<action>` status, restart, import and export
//! - `audit` listing of the hash-chained audit trail
//!
//! # Security
//!
//! - HTTP Basic authentication against the configured users
//! - Role-based access control (Viewer/Operator/Admin)
//! - Audit logging of every accepted change
//! - SHA256 hash chaining for tamper detection

pub mod types;
pub mod server;
pub mod handlers;
pub mod service;
pub mod auth;
pub mod audit;
pub mod error;

// Re-exports for convenience
pub use types::{ApiResponse, AuditEntry, AuditAction, Role, UserAccount};

pub use audit::AuditLog;
pub use server::{build_router, start_admin_server, AdminServerConfig, AppState};
pub use error::{AdminError, AdminResult};
