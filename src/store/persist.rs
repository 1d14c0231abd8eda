//! Configuration persistence
//!
//! The store hands every committed document to a `ConfigPersistence`
//! implementation before making it visible, so a crash never exposes a
//! version that was not written.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, info};
use serde_json::{json, Value};

use crate::common::{AppError, Result};

/// A saved configuration document and the version it was committed as
#[derive(Debug, Clone, PartialEq)]
pub struct StoredConfig {
    pub version: u64,
    pub config: Value,
}

/// Durable storage for the committed configuration
#[cfg_attr(test, mockall::automock)]
pub trait ConfigPersistence: Send + Sync {
    /// Load the last saved configuration, `None` on first start
    fn load(&self) -> Result<Option<StoredConfig>>;

    /// Save a configuration document with its version
    fn save(&self, version: u64, config: &Value) -> Result<()>;
}

/// JSON file written atomically through a temporary sibling
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigPersistence for JsonFilePersistence {
    fn load(&self) -> Result<Option<StoredConfig>> {
        if !self.path.exists() {
            info!("No persisted configuration at {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        let stored: Value = serde_json::from_str(&content)?;
        match stored.get("Config") {
            Some(config) if config.is_object() => {
                let version = stored.get("Version").and_then(Value::as_u64).unwrap_or(1);
                debug!("Loaded configuration version {} from {}", version, self.path.display());
                Ok(Some(StoredConfig {
                    version,
                    config: config.clone(),
                }))
            }
            _ => Err(AppError::Persistence(format!(
                "{} does not contain a Config object",
                self.path.display()
            ))),
        }
    }

    fn save(&self, version: u64, config: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let stored = json!({ "Version": version, "Config": config });
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&stored)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Saved configuration version {} to {}", version, self.path.display());
        Ok(())
    }
}

/// In-process storage, used when no data directory is configured and in tests
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    saved: Mutex<Option<StoredConfig>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last saved version, if any
    pub fn version(&self) -> Option<u64> {
        self.saved.lock().ok().and_then(|saved| saved.as_ref().map(|s| s.version))
    }
}

impl ConfigPersistence for MemoryPersistence {
    fn load(&self) -> Result<Option<StoredConfig>> {
        let saved = self
            .saved
            .lock()
            .map_err(|_| AppError::Persistence("memory store lock poisoned".to_string()))?;
        Ok(saved.clone())
    }

    fn save(&self, version: u64, config: &Value) -> Result<()> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|_| AppError::Persistence("memory store lock poisoned".to_string()))?;
        *saved = Some(StoredConfig {
            version,
            config: config.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempdir().unwrap();
        let persistence = JsonFilePersistence::new(dir.path().join("state").join("config.json"));

        assert!(persistence.load().unwrap().is_none());

        let config = json!({"ServerName": "edge-1"});
        persistence.save(3, &config).unwrap();
        assert_eq!(persistence.load().unwrap(), Some(StoredConfig { version: 3, config }));

        let raw: Value = serde_json::from_str(&fs::read_to_string(persistence.path()).unwrap()).unwrap();
        assert_eq!(raw["Version"], json!(3));
        assert!(!persistence.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_json_file_rejects_malformed_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{\"Version\": 1}").unwrap();

        let err = JsonFilePersistence::new(&path).load().unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));

        fs::write(&path, "not json").unwrap();
        let err = JsonFilePersistence::new(&path).load().unwrap_err();
        assert!(matches!(err, AppError::Json(_)));
    }

    #[test]
    fn test_memory_persistence() {
        let persistence = MemoryPersistence::new();
        assert!(persistence.load().unwrap().is_none());
        persistence.save(7, &json!({})).unwrap();
        assert_eq!(persistence.version(), Some(7));
    }
}
