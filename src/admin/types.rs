//! Admin API Data Types
//!
//! Response envelopes, user accounts and audit records used by the admin API.

use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Code and message of a successful config mutation
pub const SUCCESS_CODE: &str = "CWLNA0000";
pub const SUCCESS_MESSAGE: &str = "Success";

/// Code and message of a completed service operation or delete
pub const COMPLETED_CODE: &str = "CWLNA6011";
pub const COMPLETED_MESSAGE: &str = "The requested configuration change has completed successfully.";

/// `{"Code","Message"}` envelope with optional extra members
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse {
    #[serde(rename = "Code")]
    pub code: String,

    #[serde(rename = "Message")]
    pub message: String,

    /// Extra top-level members, e.g. the objects a POST changed
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl ApiResponse {
    /// `CWLNA0000 Success`
    pub fn success() -> Self {
        Self::new(SUCCESS_CODE, SUCCESS_MESSAGE)
    }

    /// `CWLNA6011`
    pub fn completed() -> Self {
        Self::new(COMPLETED_CODE, COMPLETED_MESSAGE)
    }

    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            body: Map::new(),
        }
    }

    /// Merge every member of a JSON object into the envelope
    pub fn with_members(mut self, members: Value) -> Self {
        if let Value::Object(map) = members {
            self.body.extend(map);
        }
        self
    }
}

/// RBAC role for admin API access
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    /// Read-only access
    Viewer,

    /// Can modify configuration objects and upload files
    Operator,

    /// Can also run service operations and read the audit trail
    Admin,
}

/// Basic-auth user account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAccount {
    /// Login name, recorded as the operator in audit entries
    pub name: String,

    /// Plain-text password compared in constant time
    pub password: String,

    /// Granted role
    pub role: Role,
}

/// Immutable audit log record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry ID
    pub id: Uuid,

    /// Entry timestamp
    pub timestamp: DateTime<Utc>,

    /// Operator who made the change
    pub operator: String,

    /// Operator's role
    pub role: Role,

    /// Action performed
    pub action: AuditAction,

    /// Object or service the action addressed, e.g. `Forwarder/m2w`
    pub target: String,

    /// Configuration version after the action, if it committed one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,

    /// Whether the action took effect
    pub applied: bool,

    /// Free-form details, e.g. the changes a POST made
    #[serde(default)]
    pub details: Value,

    /// Hash of previous audit entry (for tamper detection)
    pub prev_hash: String,

    /// SHA256 hash of this entry
    pub hash: String,
}

/// Type of audit event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditAction {
    /// Configuration objects created or updated
    ConfigPost,

    /// Configuration object deleted
    ConfigDelete,

    /// File uploaded
    FileUpload,

    /// Configuration exported
    ConfigExport,

    /// Configuration imported (preview)
    ConfigImportPreview,

    /// Configuration imported (applied)
    ConfigImportApply,

    /// Server restarted
    Restart,

    /// Configuration reset to factory defaults
    ConfigReset,

    /// Authentication failure
    AuthFailure,

    /// Authorization failure
    AuthzFailure,
}

/// Query parameters for `GET audit`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    /// Maximum entries to return, newest last
    pub limit: Option<usize>,

    /// Only entries with this operator
    pub operator: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_response_flattens_members() {
        let response = ApiResponse::success().with_members(json!({"Forwarder": {"m2w": {"Enabled": true}}}));
        let rendered = serde_json::to_value(&response).unwrap();
        assert_eq!(
            rendered,
            json!({"Code": "CWLNA0000", "Message": "Success", "Forwarder": {"m2w": {"Enabled": true}}})
        );
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Admin > Role::Operator);
        assert!(Role::Operator > Role::Viewer);
    }
}
