//! Authentication and Authorization Module
//!
//! HTTP Basic authentication against the configured user accounts and RBAC
//! (Role-Based Access Control) for the admin API.

use std::sync::Arc;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::admin::types::{UserAccount, Role, AuditAction};
use crate::admin::error::{AdminError, AdminResult};

/// Authentication state shared across handlers
#[derive(Debug, Clone)]
pub struct AuthState {
    /// Accounts allowed to log in
    pub users: Arc<Vec<UserAccount>>,
}

impl AuthState {
    /// Create a new authentication state
    pub fn new(users: Vec<UserAccount>) -> Self {
        Self {
            users: Arc::new(users),
        }
    }

    /// Validate a user name and password and return the account's role
    pub fn validate_credentials(&self, name: &str, password: &str) -> Option<Role> {
        let user = self.users.iter().find(|u| u.name == name)?;
        if constant_time_compare(&user.password, password) {
            log::debug!("Authenticated user: {} with role: {:?}", user.name, user.role);
            Some(user.role)
        } else {
            None
        }
    }
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (byte_a, byte_b) in a.bytes().zip(b.bytes()) {
        result |= byte_a ^ byte_b;
    }

    result == 0
}

/// Decode a `Basic` authorization header into user name and password
pub fn parse_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (name, password) = decoded.split_once(':')?;
    Some((name.to_string(), password.to_string()))
}

/// Authenticated user information
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Username/operator name
    pub name: String,

    /// User's role
    pub role: Role,
}

/// Authentication middleware
pub async fn auth_middleware(
    State(auth_state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AdminError> {
    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(auth_header) = auth_header else {
        log_auth_event(AuditAction::AuthFailure, "unknown", "Missing Authorization header");
        return Err(AdminError::Authentication("Missing Authorization header".to_string()));
    };

    let Some((name, password)) = parse_basic(auth_header) else {
        log_auth_event(AuditAction::AuthFailure, "unknown", "Invalid Authorization header format");
        return Err(AdminError::Authentication("Invalid Authorization header format".to_string()));
    };

    let Some(role) = auth_state.validate_credentials(&name, &password) else {
        log_auth_event(AuditAction::AuthFailure, &name, "Invalid credentials");
        return Err(AdminError::Authentication("Invalid credentials".to_string()));
    };

    req.extensions_mut().insert(AuthUser { name, role });
    Ok(next.run(req).await)
}

/// Require specific role for endpoint access
pub fn require_role(user: &AuthUser, required_role: Role) -> AdminResult<()> {
    if user.role >= required_role {
        Ok(())
    } else {
        let reason = format!(
            "Insufficient permissions: {:?} required, but user has {:?}",
            required_role, user.role
        );
        log_auth_event(AuditAction::AuthzFailure, &user.name, &reason);
        Err(AdminError::Authorization(reason))
    }
}

/// Log authentication/authorization event
fn log_auth_event(action: AuditAction, operator: &str, message: &str) {
    match action {
        AuditAction::AuthFailure => {
            log::warn!(
                "AUTH_EVENT: Authentication failure - operator: {}, reason: {}",
                operator,
                message
            );
        }
        AuditAction::AuthzFailure => {
            log::warn!(
                "AUTH_EVENT: Authorization failure - operator: {}, reason: {}",
                operator,
                message
            );
        }
        _ => {
            log::info!("AUTH_EVENT: {:?} - operator: {}, details: {}", action, operator, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> AuthState {
        AuthState::new(vec![
            UserAccount {
                name: "admin".to_string(),
                password: "admin".to_string(),
                role: Role::Admin,
            },
            UserAccount {
                name: "viewer".to_string(),
                password: "look".to_string(),
                role: Role::Viewer,
            },
        ])
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("secret", "secret"));
        assert!(!constant_time_compare("secret", "public"));
        assert!(!constant_time_compare("short", "longer"));
    }

    #[test]
    fn test_parse_basic() {
        let header = format!("Basic {}", STANDARD.encode("admin:pa:ss"));
        assert_eq!(parse_basic(&header), Some(("admin".to_string(), "pa:ss".to_string())));
        assert_eq!(parse_basic("Bearer token"), None);
        assert_eq!(parse_basic("Basic !!!"), None);
    }

    #[test]
    fn test_credentials_validation() {
        let auth_state = users();
        assert_eq!(auth_state.validate_credentials("admin", "admin"), Some(Role::Admin));
        assert_eq!(auth_state.validate_credentials("viewer", "look"), Some(Role::Viewer));
        assert_eq!(auth_state.validate_credentials("viewer", "admin"), None);
        assert_eq!(auth_state.validate_credentials("nobody", "admin"), None);
    }

    #[test]
    fn test_require_role() {
        let admin_user = AuthUser {
            name: "admin".to_string(),
            role: Role::Admin,
        };

        let operator_user = AuthUser {
            name: "operator".to_string(),
            role: Role::Operator,
        };

        assert!(require_role(&admin_user, Role::Admin).is_ok());
        assert!(require_role(&operator_user, Role::Admin).is_err());
        assert!(require_role(&operator_user, Role::Operator).is_ok());
    }
}
