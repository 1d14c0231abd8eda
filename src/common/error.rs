//! Error handling module
//!
//! This module defines the process-level error type and result alias used by
//! settings loading, persistence and server startup.

use thiserror::Error;
use std::io;

/// Appliance config API error type
#[derive(Error, Debug)]
pub enum AppError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration document rejected
    #[error("Configuration error: {0}")]
    Config(#[from] crate::validate::ConfigError),

    /// Process settings could not be loaded
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// Process settings were loaded but are not usable
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Persisted configuration could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// HTTP server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let app_err: AppError = io_err.into();

        match app_err {
            AppError::Io(_) => {}
            _ => panic!("Should convert to IO error"),
        }
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let app_err: AppError = json_err.into();
        assert!(matches!(app_err, AppError::Json(_)));
    }

    #[test]
    fn test_error_display() {
        let err = AppError::InvalidSettings("admin_prefix must not be empty".to_string());
        let err_str = format!("{}", err);
        assert!(err_str.contains("admin_prefix must not be empty"));
    }
}
