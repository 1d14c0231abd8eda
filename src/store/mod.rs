//! Configuration store
//!
//! The store holds the committed configuration as an immutable, versioned
//! snapshot behind a readers-writer lock. Readers clone the `Arc` and never
//! block each other. Every mutation goes through `commit`, which validates a
//! working copy, persists it and only then swaps it in, so a rejected request
//! leaves the visible snapshot untouched.

pub mod document;
pub mod files;
pub mod persist;

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::{json, Value};

use crate::common::{AppError, Result};
use crate::schema::{KeyShape, SchemaRegistry};
use crate::validate::{build_document, ApplyOptions, ConfigError, ConfigResult, Outcome, Validator};

pub use document::{CompositeKey, ConfigDocument, ObjectSet, Properties, View};
pub use files::{referenced_files, FileStage, Installed};
pub use persist::{ConfigPersistence, JsonFilePersistence, MemoryPersistence, StoredConfig};

/// An immutable committed configuration
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub version: u64,
    pub document: ConfigDocument,
    pub committed_at: DateTime<Utc>,
}

/// Result of a successful commit
#[derive(Debug, Clone)]
pub struct Committed {
    pub snapshot: Arc<Snapshot>,
    pub outcome: Outcome,
}

/// How an imported configuration is applied
#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    /// Set `Enabled:false` on every imported object that has it
    pub disable_objects: bool,

    /// Commit the result; otherwise only validate and preview it
    pub persist: bool,
}

/// Validated import
#[derive(Debug, Clone)]
pub struct Imported {
    /// Public rendering of the resulting configuration
    pub document: Value,

    /// Committed version, `None` for a preview
    pub version: Option<u64>,
}

/// The single owner of the committed configuration
pub struct ConfigStore {
    registry: Arc<SchemaRegistry>,
    current: RwLock<Arc<Snapshot>>,
    persistence: Box<dyn ConfigPersistence>,
    files: FileStage,
}

impl ConfigStore {
    /// Open the store, seeding factory defaults on first start
    pub fn open(registry: Arc<SchemaRegistry>, persistence: Box<dyn ConfigPersistence>, files: FileStage) -> Result<Self> {
        let snapshot = match persistence.load()? {
            Some(stored) => {
                let document = build_document(&registry, &stored.config)?;
                info!("Loaded configuration version {}", stored.version);
                Snapshot {
                    version: stored.version,
                    document,
                    committed_at: Utc::now(),
                }
            }
            None => {
                let document = build_document(&registry, registry.defaults())?;
                persistence.save(1, &document.to_json(&registry, View::Full))?;
                info!("Initialized factory default configuration");
                Snapshot {
                    version: 1,
                    document,
                    committed_at: Utc::now(),
                }
            }
        };

        Ok(Self {
            registry,
            current: RwLock::new(Arc::new(snapshot)),
            persistence,
            files,
        })
    }

    /// Open a store backed by memory only
    pub fn in_memory(registry: Arc<SchemaRegistry>, files: FileStage) -> Result<Self> {
        Self::open(registry, Box::new(MemoryPersistence::new()), files)
    }

    /// The current committed snapshot
    pub fn snapshot(&self) -> ConfigResult<Arc<Snapshot>> {
        let current = self.current.read().map_err(|_| poisoned())?;
        Ok(Arc::clone(&current))
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn files(&self) -> &FileStage {
        &self.files
    }

    /// Apply a POST body
    pub fn post(&self, body: &Value) -> ConfigResult<Committed> {
        self.commit(|doc| {
            Validator::new(&self.registry, &self.files, ApplyOptions::request()).apply_post(doc, body)
        })
    }

    /// Delete the instance addressed by a type segment and its key segments
    pub fn delete(&self, type_segment: &str, segments: &[&str]) -> ConfigResult<Committed> {
        let ty = self.registry.lookup(type_segment).ok_or_else(|| ConfigError::HttpNotFound {
            path: type_segment.to_string(),
        })?;
        self.commit(|doc| {
            Validator::new(&self.registry, &self.files, ApplyOptions::request()).apply_delete(doc, ty, segments)
        })
    }

    /// Validate an imported configuration and optionally commit it
    ///
    /// Reset-excluded types keep their current values.
    pub fn import(&self, config: &Value, options: ImportOptions) -> ConfigResult<Imported> {
        let mut imported = build_document(&self.registry, config)?;
        if options.disable_objects {
            disable_all(&self.registry, &mut imported);
        }

        let current = self.snapshot()?;
        self.keep_excluded(&current.document, &mut imported);

        if !options.persist {
            debug!("Previewed import without committing");
            return Ok(Imported {
                document: imported.to_json(&self.registry, View::Public),
                version: None,
            });
        }

        let committed = self.commit(|doc| {
            self.keep_excluded(doc, &mut imported);
            *doc = imported.clone();
            Ok(Outcome::default())
        })?;
        info!("Imported configuration as version {}", committed.snapshot.version);
        Ok(Imported {
            document: committed.snapshot.document.to_json(&self.registry, View::Public),
            version: Some(committed.snapshot.version),
        })
    }

    /// Restore factory defaults, keeping reset-excluded types
    pub fn reset_to_defaults(&self) -> ConfigResult<Committed> {
        let mut fresh = build_document(&self.registry, self.registry.defaults())?;
        let committed = self.commit(|doc| {
            self.keep_excluded(doc, &mut fresh);
            *doc = fresh.clone();
            Ok(Outcome::default())
        })?;
        info!("Configuration reset to factory defaults, version {}", committed.snapshot.version);
        Ok(committed)
    }

    /// Reload the committed document from persistence
    pub fn reload(&self) -> Result<Arc<Snapshot>> {
        let stored = self
            .persistence
            .load()?
            .ok_or_else(|| AppError::Persistence("no committed configuration to reload".to_string()))?;
        let document = build_document(&self.registry, &stored.config)?;
        let snapshot = Arc::new(Snapshot {
            version: stored.version,
            document,
            committed_at: Utc::now(),
        });

        let mut current = self.current.write().map_err(|_| AppError::Persistence("store lock poisoned".to_string()))?;
        *current = Arc::clone(&snapshot);
        debug!("Reloaded configuration version {}", snapshot.version);
        Ok(snapshot)
    }

    /// Validate-then-commit
    ///
    /// `mutate` works on a copy of the current document. Claimed files are
    /// installed first, then the copy is persisted under the next version
    /// and becomes current; on any error the installs are rolled back and
    /// nothing changes. A mutation that leaves the document equal keeps the
    /// current version. Installed files the new document no longer refers to
    /// are removed afterwards.
    fn commit<F>(&self, mutate: F) -> ConfigResult<Committed>
    where
        F: FnOnce(&mut ConfigDocument) -> ConfigResult<Outcome>,
    {
        let mut current = self.current.write().map_err(|_| poisoned())?;
        let mut working = current.document.clone();
        let outcome = mutate(&mut working)?;

        let installed = self.install_claims(&outcome)?;

        let previous = Arc::clone(&current);
        let snapshot = if working == current.document {
            Arc::clone(&current)
        } else {
            let version = current.version + 1;
            let saved = self.persistence.save(version, &working.to_json(&self.registry, View::Full));
            if let Err(e) = saved {
                for install in installed {
                    self.files.rollback(install);
                }
                return Err(ConfigError::System(e.to_string()));
            }
            let snapshot = Arc::new(Snapshot {
                version,
                document: working,
                committed_at: Utc::now(),
            });
            *current = Arc::clone(&snapshot);
            metrics::counter!("config_commits_total").increment(1);
            snapshot
        };
        drop(current);

        for install in installed {
            self.files.finish(install);
        }
        if !Arc::ptr_eq(&previous, &snapshot) {
            self.release_files(&previous.document, &snapshot.document);
        }

        Ok(Committed { snapshot, outcome })
    }

    fn install_claims(&self, outcome: &Outcome) -> ConfigResult<Vec<Installed>> {
        let mut installed = Vec::with_capacity(outcome.claims.len());
        for claim in &outcome.claims {
            match self.files.install(claim) {
                Ok(install) => installed.push(install),
                Err(e) => {
                    warn!("Failed to install {} for {} {}: {}", claim.file, claim.object, claim.owner, e);
                    for install in installed.into_iter().rev() {
                        self.files.rollback(install);
                    }
                    return Err(e);
                }
            }
        }
        Ok(installed)
    }

    fn release_files(&self, before: &ConfigDocument, after: &ConfigDocument) {
        let kept = referenced_files(&self.registry, after);
        for claim in referenced_files(&self.registry, before).difference(&kept) {
            if let Err(e) = self.files.remove(claim) {
                warn!("Failed to remove {} for {} {}: {}", claim.file, claim.object, claim.owner, e);
            }
        }
    }

    fn keep_excluded(&self, current: &ConfigDocument, target: &mut ConfigDocument) {
        for name in self.registry.reset_exclusions() {
            if let Some(set) = current.set(name) {
                target.put_set(name, set.clone());
            }
        }
    }
}

/// Set `Enabled:false` on every named instance whose type declares `Enabled`
fn disable_all(registry: &SchemaRegistry, doc: &mut ConfigDocument) {
    for ty in registry.types() {
        if !matches!(ty.shape, KeyShape::Named) || ty.spec("Enabled").is_none() {
            continue;
        }
        let names: Vec<String> = doc.named_all(ty.name).map(|(name, _)| name.clone()).collect();
        for name in names {
            if let Some(mut props) = doc.remove_named(ty.name, &name) {
                props.insert("Enabled".to_string(), json!(false));
                doc.insert_named(ty.name, name, props);
            }
        }
    }
}

fn poisoned() -> ConfigError {
    ConfigError::System("configuration store lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use crate::store::persist::MockConfigPersistence;
    use crate::validate::FileCatalog;

    fn store_in(dir: &std::path::Path) -> ConfigStore {
        let registry = Arc::new(SchemaRegistry::standard());
        let persistence = JsonFilePersistence::new(dir.join("config.json"));
        ConfigStore::open(registry, Box::new(persistence), FileStage::new(dir)).unwrap()
    }

    #[test]
    fn test_first_open_seeds_defaults() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.version, 1);
        assert!(snapshot.document.has_named("Forwarder", "m2w"));
        assert!(dir.path().join("config.json").exists());
    }

    #[test]
    fn test_commit_bumps_version_and_persists() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let committed = store.post(&json!({"ServerName": "edge-1"})).unwrap();
        assert_eq!(committed.snapshot.version, 2);

        let reopened = store_in(dir.path());
        let snapshot = reopened.snapshot().unwrap();
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.document.scalar("ServerName"), Some(&json!("edge-1")));
    }

    #[test]
    fn test_rejected_request_leaves_snapshot_untouched() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let before = store.snapshot().unwrap();

        let err = store.post(&json!({"Forwarder": {"m2w": {"Enabled": "true"}}})).unwrap_err();
        assert_eq!(err.code(), "CWLNA0112");

        let after = store.snapshot().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_unchanged_commit_keeps_version() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let committed = store.post(&json!({"Forwarder": {"m2w": {"Enabled": true}}})).unwrap();
        assert_eq!(committed.snapshot.version, 1);
    }

    #[test]
    fn test_delete_unknown_type() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let err = store.delete("Queue", &["q1"]).unwrap_err();
        assert_eq!(err, ConfigError::HttpNotFound { path: "Queue".to_string() });
    }

    #[test]
    fn test_reset_keeps_excluded_types() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .post(&json!({
                "LicensedUsage": "Production",
                "AdminEndpoint": {"Port": 9443},
                "ServerName": "edge-1",
                "Forwarder": {"extra": {"Topic": "t", "Source": "MqttServer", "Destination": "WIoTP"}}
            }))
            .unwrap();

        let committed = store.reset_to_defaults().unwrap();
        let doc = &committed.snapshot.document;
        assert_eq!(doc.scalar("LicensedUsage"), Some(&json!("Production")));
        assert_eq!(doc.singleton("AdminEndpoint").unwrap()["Port"], json!(9443));
        assert_eq!(doc.scalar("ServerName"), Some(&json!("")));
        assert!(!doc.has_named("Forwarder", "extra"));
    }

    #[test]
    fn test_import_preview_does_not_commit() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let mut exported = store.snapshot().unwrap().document.to_json(store.registry(), View::Full);
        exported["ServerName"] = json!("imported");

        let preview = store
            .import(&exported, ImportOptions { disable_objects: true, persist: false })
            .unwrap();
        assert_eq!(preview.version, None);
        assert_eq!(preview.document["ServerName"], json!("imported"));
        assert_eq!(preview.document["Forwarder"]["m2w"]["Enabled"], json!(false));
        assert_eq!(store.snapshot().unwrap().version, 1);

        let applied = store
            .import(&exported, ImportOptions { disable_objects: false, persist: true })
            .unwrap();
        assert_eq!(applied.version, Some(2));
        assert_eq!(applied.document["Forwarder"]["m2w"]["Enabled"], json!(true));
    }

    #[test]
    fn test_save_failure_is_system_error() {
        let dir = tempdir().unwrap();
        let mut persistence = MockConfigPersistence::new();
        persistence.expect_load().returning(|| Ok(None));
        persistence.expect_save().returning(|version, _| {
            if version == 1 {
                Ok(())
            } else {
                Err(AppError::Persistence("disk full".to_string()))
            }
        });

        let store = ConfigStore::open(
            Arc::new(SchemaRegistry::standard()),
            Box::new(persistence),
            FileStage::new(dir.path()),
        )
        .unwrap();

        let err = store.post(&json!({"ServerName": "edge-1"})).unwrap_err();
        assert_eq!(err.code(), "CWLNA0100");
        assert_eq!(store.snapshot().unwrap().document.scalar("ServerName"), Some(&json!("")));
    }

    #[test]
    fn test_reload_restores_persisted_state() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.post(&json!({"ServerName": "edge-1"})).unwrap();
        let reloaded = store.reload().unwrap();
        assert_eq!(reloaded.version, 2);
        assert_eq!(reloaded.document.scalar("ServerName"), Some(&json!("edge-1")));
    }

    #[test]
    fn test_save_failure_rolls_back_installed_files() {
        let dir = tempdir().unwrap();
        let mut persistence = MockConfigPersistence::new();
        persistence.expect_load().returning(|| Ok(None));
        persistence.expect_save().returning(|version, _| {
            if version == 1 {
                Ok(())
            } else {
                Err(AppError::Persistence("disk full".to_string()))
            }
        });
        let files = FileStage::new(dir.path());
        files.stage("server.crt", b"cert").unwrap();
        files.stage("server.key", b"key").unwrap();
        let store = ConfigStore::open(Arc::new(SchemaRegistry::standard()), Box::new(persistence), files).unwrap();

        let err = store
            .post(&json!({"CertificateProfile": {"CP": {"Certificate": "server.crt", "Key": "server.key"}}}))
            .unwrap_err();
        assert_eq!(err.code(), "CWLNA0100");
        assert!(!store.files().installed_path("CertificateProfile", "CP", "server.crt").exists());
        assert!(store.files().has_file("server.crt"));
        assert!(store.files().has_file("server.key"));
    }

    #[test]
    fn test_deleted_certificates_release_installed_files() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        for name in ["server.crt", "server.key", "client.pem"] {
            store.files().stage(name, name.as_bytes()).unwrap();
        }
        store
            .post(&json!({
                "CertificateProfile": {"CP": {"Certificate": "server.crt", "Key": "server.key"}},
                "SecurityProfile": {"SP": {"CertificateProfile": "CP"}},
                "ClientCertificate": [{"SecurityProfileName": "SP", "CertificateName": "client.pem"}]
            }))
            .unwrap();
        let client = store.files().installed_path("ClientCertificate", "SP", "client.pem");
        let cert = store.files().installed_path("CertificateProfile", "CP", "server.crt");
        assert!(client.is_file());
        assert!(cert.is_file());

        // Cascades to the client certificate
        store.delete("SecurityProfile", &["SP"]).unwrap();
        assert!(!client.exists());
        assert!(cert.is_file());

        store.delete("CertificateProfile", &["CP"]).unwrap();
        assert!(!cert.exists());
    }
}
