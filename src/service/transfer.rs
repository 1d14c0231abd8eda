//! Export envelope
//!
//! An exported configuration is sealed with a password: the envelope carries
//! the SHA-256 of `password + "-" + config`, where `config` is the compact
//! JSON rendering with keys in sorted order. Import recomputes the digest and
//! refuses the file on mismatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::validate::{ConfigError, ConfigResult};

/// Exported configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportEnvelope {
    pub version: String,
    pub created: DateTime<Utc>,
    pub digest: String,
    pub config: Value,
}

/// Hex digest binding `config` to `password`
pub fn digest(password: &str, config: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(b"-");
    hasher.update(config.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Seal a configuration for export
pub fn seal(password: &str, config: Value) -> ExportEnvelope {
    ExportEnvelope {
        version: crate::VERSION.to_string(),
        created: Utc::now(),
        digest: digest(password, &config),
        config,
    }
}

/// Open an exported file, returning its configuration
pub fn open(file_name: &str, content: &[u8], password: &str) -> ConfigResult<Value> {
    let mismatch = || ConfigError::DigestMismatch {
        file: file_name.to_string(),
    };
    let envelope: ExportEnvelope = serde_json::from_slice(content).map_err(|_| mismatch())?;
    if digest(password, &envelope.config) != envelope.digest {
        return Err(mismatch());
    }
    Ok(envelope.config)
}
