//! Service operations
//!
//! Server lifecycle (status, restart, maintenance), export and import of the
//! configuration, and the strict parsers for their request payloads.

pub mod lifecycle;
pub mod request;
pub mod transfer;

pub use lifecycle::{RestartMode, ServerState, ServerStatus, ServiceController};
pub use request::{ExportRequest, ImportRequest, RestartRequest};
pub use transfer::ExportEnvelope;
