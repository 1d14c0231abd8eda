//! Admin API Error Types
//!
//! Every failure leaves the API as a `{"Code","Message"}` body. Configuration
//! errors carry their own catalog code and status; authentication,
//! authorization and internal failures map to fixed codes.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response, Json};

use crate::admin::types::ApiResponse;
use crate::validate::ConfigError;

/// Result type for admin API operations
pub type AdminResult<T> = Result<T, AdminError>;

/// Catalog code of an error response, kept as a response extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseCode(pub &'static str);

/// Admin API error types
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// Request rejected by validation or the store
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization failed (insufficient permissions)
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// Audit log error
    #[error("Audit log error: {0}")]
    AuditLog(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdminError {
    /// Catalog code reported to the client
    pub fn code(&self) -> &'static str {
        match self {
            AdminError::Config(e) => e.code(),
            AdminError::Authentication(_) => "CWLNA0181",
            AdminError::Authorization(_) => "CWLNA0180",
            _ => "CWLNA0100",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AdminError::Config(e) => e.status(),
            AdminError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AdminError::Authorization(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Catalog message reported to the client
    pub fn message(&self) -> String {
        match self {
            AdminError::Config(e) => e.to_string(),
            AdminError::Authentication(_) => "User authentication failed.".to_string(),
            AdminError::Authorization(_) => "The operation is not authorized.".to_string(),
            other => format!("System error: {}", other),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::debug!("Request rejected: {} {}", self.code(), self);
        }

        let body = ApiResponse::new(self.code(), &self.message());
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(ResponseCode(self.code()));
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"appliance\""),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_keeps_code_and_status() {
        let err: AdminError = ConfigError::HttpNotFound { path: "Forwarder/x".to_string() }.into();
        assert_eq!(err.code(), "CWLNA0404");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "The HTTP request is for an object which does not exist.: Forwarder/x");
    }

    #[test]
    fn test_auth_errors() {
        let err = AdminError::Authentication("bad password".to_string());
        assert_eq!(err.code(), "CWLNA0181");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.extensions().get::<ResponseCode>(), Some(&ResponseCode("CWLNA0181")));
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

        let err = AdminError::Authorization("viewer".to_string());
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.message(), "The operation is not authorized.");
    }

    #[test]
    fn test_internal_errors_are_system_errors() {
        let err = AdminError::Internal("boom".to_string());
        assert_eq!(err.code(), "CWLNA0100");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
