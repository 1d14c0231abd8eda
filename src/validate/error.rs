//! Configuration error taxonomy
//!
//! Every rejected request maps to exactly one `ConfigError`. The `Display`
//! text of each variant is the catalog message returned to REST clients, and
//! `code()` is the stable `CWLNA####` identifier that accompanies it.

use http::StatusCode;
use thiserror::Error;

/// Result type for validation and store operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// A single deterministic configuration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Request body was empty or JSON `null`
    #[error("A null object is not allowed.")]
    NullObject,

    /// Property name not declared by the object type
    #[error("The property name is not valid: Property: {property}.")]
    UnknownProperty { property: String },

    /// Property value fails its declared type, range or enum
    #[error("The property value is not valid: Property: {property} Value: \"{value}\".")]
    InvalidValue { property: String, value: String },

    /// Unknown field in a service payload
    #[error("An argument is not valid: Name: {name}.")]
    InvalidArgument { name: String },

    /// Mutually exclusive properties were supplied together
    #[error("The properties are not valid.")]
    PropertiesNotValid,

    /// A key or service field has the wrong JSON type
    #[error("The property type is not valid. Object: {object} Name: {name} Property: {property} Type: {json_type}")]
    WrongType {
        object: String,
        name: String,
        property: String,
        json_type: &'static str,
    },

    /// Object name exceeds the maximum name length
    #[error("The name of the configuration object is too long. Object: {object} Property: {property} Value: {value}.")]
    NameTooLong {
        object: String,
        property: String,
        value: String,
    },

    /// Required property is missing or null
    #[error("The value specified for the required property is invalid or null. Property: {property} Value: {value}.")]
    RequiredMissing { property: String, value: String },

    /// Referenced object, key or file does not exist
    #[error("The item or object cannot be found. Type: {object} Name: {name}")]
    ObjectNotFound { object: String, name: String },

    /// Malformed request shape or unsupported call
    #[error("The REST API call: {call} is not valid.")]
    BadRestCall { call: String },

    /// Property value exceeds its maximum length
    #[error("The value that is specified for the property on the configuration object is too long. Object: {object} Property: {property} Value: {value}.")]
    TooLong {
        object: String,
        property: String,
        value: String,
    },

    /// The server is restarting
    #[error("Server not available.")]
    ServerNotAvailable,

    /// Singleton objects cannot be deleted
    #[error("Delete is not allowed for {object} object.")]
    DeleteNotAllowed { object: String },

    /// Object is still referenced by another object
    #[error("The Object: {object}, Name: {name} is still being used by Object: {used_by}, Name: {used_by_name}")]
    InUse {
        object: String,
        name: String,
        used_by: String,
        used_by_name: String,
    },

    /// Named object or object type does not exist
    #[error("The HTTP request is for an object which does not exist.: {path}")]
    HttpNotFound { path: String },

    /// Composite-key operation addressed with too few path segments
    #[error("The {first} and {second} parameters are needed for the REST call.")]
    MissingKeySegments { first: String, second: String },

    /// Existing keyed object re-posted without `Overwrite:true`
    #[error("The certificate already exists. Set Overwrite to true to replace the existing certificate.")]
    AlreadyExists,

    /// Import file digest does not match the supplied password
    #[error("The password or digest check failed for the file: {file}.")]
    DigestMismatch { file: String },

    /// Unexpected internal failure
    #[error("System error: {0}")]
    System(String),
}

impl ConfigError {
    /// Catalog code for this error
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::NullObject => "CWLNA0108",
            ConfigError::UnknownProperty { .. } => "CWLNA0111",
            ConfigError::InvalidValue { .. } => "CWLNA0112",
            ConfigError::InvalidArgument { .. } => "CWLNA0115",
            ConfigError::PropertiesNotValid => "CWLNA0118",
            ConfigError::WrongType { .. } => "CWLNA0127",
            ConfigError::NameTooLong { .. } => "CWLNA0133",
            ConfigError::RequiredMissing { .. } => "CWLNA0134",
            ConfigError::ObjectNotFound { .. } => "CWLNA0136",
            ConfigError::BadRestCall { .. } => "CWLNA0137",
            ConfigError::TooLong { .. } => "CWLNA0144",
            ConfigError::ServerNotAvailable => "CWLNA0167",
            ConfigError::DeleteNotAllowed { .. } => "CWLNA0372",
            ConfigError::InUse { .. } => "CWLNA0376",
            ConfigError::HttpNotFound { .. } => "CWLNA0404",
            ConfigError::MissingKeySegments { .. } => "CWLNA6167",
            ConfigError::AlreadyExists => "CWLNA6186",
            ConfigError::DigestMismatch { .. } => "CWLNA6232",
            ConfigError::System(_) => "CWLNA0100",
        }
    }

    /// HTTP status for this error
    ///
    /// 404 is reserved for missing objects; shape and value problems are 400.
    pub fn status(&self) -> StatusCode {
        match self {
            ConfigError::ObjectNotFound { .. } | ConfigError::HttpNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            ConfigError::ServerNotAvailable => StatusCode::SERVICE_UNAVAILABLE,
            ConfigError::System(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub(crate) fn invalid(property: &str, value: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            property: property.to_string(),
            value: value.into(),
        }
    }

    pub(crate) fn not_found(object: &str, name: impl Into<String>) -> Self {
        ConfigError::ObjectNotFound {
            object: object.to_string(),
            name: name.into(),
        }
    }

    pub(crate) fn bad_call(call: impl Into<String>) -> Self {
        ConfigError::BadRestCall { call: call.into() }
    }
}
