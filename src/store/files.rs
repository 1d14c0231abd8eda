//! Uploaded file staging
//!
//! Clients upload certificate material and import envelopes with
//! `PUT file/<name>`. Files land in a staging area; certificate objects
//! consume a staged file when they are created and a copy lands in the
//! installed area at `<Type>/<owner>/<file>`, so two instances using the
//! same file name never share key material.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::schema::{KeyShape, SchemaRegistry};
use crate::validate::{ConfigError, ConfigResult, FileCatalog, FileClaim};
use super::document::ConfigDocument;

/// Maximum length of an uploaded file name
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Staging and installed areas under the data directory
#[derive(Debug, Clone)]
pub struct FileStage {
    staging: PathBuf,
    installed: PathBuf,
}

/// A claim copied into the installed area, not yet finished
///
/// Until `finish` the staged file stays in place and any file it replaced
/// is kept aside, so `rollback` restores the previous state.
#[derive(Debug)]
pub struct Installed {
    claim: FileClaim,
    path: PathBuf,
    previous: Option<PathBuf>,
}

impl FileStage {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            staging: data_dir.join("userfiles"),
            installed: data_dir.join("certificates"),
        }
    }

    /// Store uploaded bytes under `name`, replacing any earlier upload
    pub fn stage(&self, name: &str, content: &[u8]) -> ConfigResult<PathBuf> {
        check_name(name)?;
        fs::create_dir_all(&self.staging).map_err(system)?;
        let path = self.staging.join(name);
        fs::write(&path, content).map_err(system)?;
        info!("Staged file {} ({} bytes)", name, content.len());
        Ok(path)
    }

    /// Read a staged file
    pub fn read(&self, name: &str) -> ConfigResult<Vec<u8>> {
        check_name(name)?;
        match fs::read(self.staging.join(name)) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ConfigError::not_found("File", name)),
            Err(e) => Err(system(e)),
        }
    }

    /// Copy a claimed staged file into the owner's installed directory
    pub fn install(&self, claim: &FileClaim) -> ConfigResult<Installed> {
        check_name(&claim.owner)?;
        check_name(&claim.file)?;
        let dir = self.installed.join(claim.object).join(&claim.owner);
        fs::create_dir_all(&dir).map_err(system)?;
        let path = dir.join(&claim.file);

        let previous = if path.exists() {
            let aside = dir.join(format!(".{}.previous", claim.file));
            fs::rename(&path, &aside).map_err(system)?;
            Some(aside)
        } else {
            None
        };

        if let Err(e) = fs::copy(self.staging.join(&claim.file), &path) {
            if let Some(aside) = &previous {
                restore(aside, &path);
            }
            return Err(system(e));
        }
        debug!("Installed {} for {} {}", claim.file, claim.object, claim.owner);
        Ok(Installed {
            claim: claim.clone(),
            path,
            previous,
        })
    }

    /// Keep an install: drop the replaced file and the consumed upload
    pub fn finish(&self, installed: Installed) -> PathBuf {
        if let Some(aside) = &installed.previous {
            if let Err(e) = fs::remove_file(aside) {
                warn!("Failed to remove replaced file {}: {}", aside.display(), e);
            }
        }
        match fs::remove_file(self.staging.join(&installed.claim.file)) {
            Ok(()) => {}
            // Already consumed by another claim of the same commit
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staged file {}: {}", installed.claim.file, e),
        }
        installed.path
    }

    /// Undo an install, putting back the file it replaced
    pub fn rollback(&self, installed: Installed) {
        if let Err(e) = fs::remove_file(&installed.path) {
            warn!("Failed to remove {}: {}", installed.path.display(), e);
        }
        if let Some(aside) = &installed.previous {
            restore(aside, &installed.path);
        }
        debug!("Rolled back {} for {} {}", installed.claim.file, installed.claim.object, installed.claim.owner);
    }

    /// Remove the installed file of an instance that no longer exists
    pub fn remove(&self, claim: &FileClaim) -> ConfigResult<()> {
        check_name(&claim.owner)?;
        check_name(&claim.file)?;
        let path = self.installed_path(claim.object, &claim.owner, &claim.file);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(system(e)),
        }
        // Leaves a non-empty owner directory in place
        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir(dir);
        }
        debug!("Removed {} for {} {}", claim.file, claim.object, claim.owner);
        Ok(())
    }

    /// Path of an installed file
    pub fn installed_path(&self, object: &str, owner: &str, file: &str) -> PathBuf {
        self.installed.join(object).join(owner).join(file)
    }
}

impl FileCatalog for FileStage {
    fn has_file(&self, name: &str) -> bool {
        check_name(name).is_ok() && self.staging.join(name).is_file()
    }
}

/// Installed files a document refers to
pub fn referenced_files(registry: &SchemaRegistry, doc: &ConfigDocument) -> HashSet<FileClaim> {
    let mut files = HashSet::new();
    for ty in registry.types() {
        match &ty.shape {
            KeyShape::Named => {
                for (name, props) in doc.named_all(ty.name) {
                    for spec in ty.properties.iter().filter(|spec| spec.file_ref) {
                        if let Some(file) = props.get(spec.name).and_then(|v| v.as_str()) {
                            files.insert(FileClaim {
                                object: ty.name,
                                owner: name.clone(),
                                file: file.to_string(),
                            });
                        }
                    }
                }
            }
            KeyShape::Composite(parts) => {
                for key in doc.composite_keys(ty.name) {
                    for (part, value) in parts.iter().zip([key.first(), key.second()]) {
                        if part.names_file {
                            files.insert(FileClaim {
                                object: ty.name,
                                owner: key.first().to_string(),
                                file: value.to_string(),
                            });
                        }
                    }
                }
            }
            KeyShape::Scalar | KeyShape::Singleton => {}
        }
    }
    files
}

/// Whether `name` is usable as a single path component
pub fn is_valid_file_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().count() <= MAX_FILE_NAME_LEN
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

fn check_name(name: &str) -> ConfigResult<()> {
    if is_valid_file_name(name) {
        Ok(())
    } else {
        Err(ConfigError::invalid("FileName", name))
    }
}

fn restore(aside: &Path, path: &Path) {
    if let Err(e) = fs::rename(aside, path) {
        warn!("Failed to restore {}: {}", path.display(), e);
    }
}

fn system(e: io::Error) -> ConfigError {
    ConfigError::System(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn claim(owner: &str, file: &str) -> FileClaim {
        FileClaim {
            object: "ClientCertificate",
            owner: owner.to_string(),
            file: file.to_string(),
        }
    }

    #[test]
    fn test_stage_and_install() {
        let dir = tempdir().unwrap();
        let files = FileStage::new(dir.path());

        files.stage("client.pem", b"-----BEGIN CERTIFICATE-----").unwrap();
        assert!(files.has_file("client.pem"));
        assert_eq!(files.read("client.pem").unwrap(), b"-----BEGIN CERTIFICATE-----");

        let installed = files.install(&claim("SP", "client.pem")).unwrap();
        assert!(files.has_file("client.pem"));
        let path = files.finish(installed);
        assert_eq!(path, files.installed_path("ClientCertificate", "SP", "client.pem"));
        assert!(path.is_file());
        assert!(!files.has_file("client.pem"));
    }

    #[test]
    fn test_same_file_name_installs_per_owner() {
        let dir = tempdir().unwrap();
        let files = FileStage::new(dir.path());

        files.stage("client.pem", b"first").unwrap();
        let first = files.install(&claim("sp1", "client.pem")).unwrap();
        files.finish(first);
        files.stage("client.pem", b"second").unwrap();
        let second = files.install(&claim("sp2", "client.pem")).unwrap();
        files.finish(second);

        assert_eq!(fs::read(files.installed_path("ClientCertificate", "sp1", "client.pem")).unwrap(), b"first");
        assert_eq!(fs::read(files.installed_path("ClientCertificate", "sp2", "client.pem")).unwrap(), b"second");
    }

    #[test]
    fn test_rollback_restores_replaced_file() {
        let dir = tempdir().unwrap();
        let files = FileStage::new(dir.path());
        let path = files.installed_path("ClientCertificate", "SP", "client.pem");

        files.stage("client.pem", b"v1").unwrap();
        let installed = files.install(&claim("SP", "client.pem")).unwrap();
        files.finish(installed);

        files.stage("client.pem", b"v2").unwrap();
        let installed = files.install(&claim("SP", "client.pem")).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"v2");
        files.rollback(installed);

        assert_eq!(fs::read(&path).unwrap(), b"v1");
        assert!(files.has_file("client.pem"));
    }

    #[test]
    fn test_install_without_upload_fails() {
        let dir = tempdir().unwrap();
        let files = FileStage::new(dir.path());

        let err = files.install(&claim("SP", "missing.pem")).unwrap_err();
        assert_eq!(err.code(), "CWLNA0100");
    }

    #[test]
    fn test_remove_installed_file() {
        let dir = tempdir().unwrap();
        let files = FileStage::new(dir.path());

        files.stage("client.pem", b"x").unwrap();
        let path = files.finish(files.install(&claim("SP", "client.pem")).unwrap());
        files.remove(&claim("SP", "client.pem")).unwrap();
        assert!(!path.exists());
        assert!(!path.parent().unwrap().exists());

        // Removing twice is not an error
        files.remove(&claim("SP", "client.pem")).unwrap();
    }

    #[test]
    fn test_rejects_path_traversal() {
        let dir = tempdir().unwrap();
        let files = FileStage::new(dir.path());

        let err = files.stage("../escape.pem", b"x").unwrap_err();
        assert_eq!(err, ConfigError::invalid("FileName", "../escape.pem"));
        assert!(!files.has_file(".."));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let files = FileStage::new(dir.path());
        assert_eq!(files.read("nope.cfg").unwrap_err(), ConfigError::not_found("File", "nope.cfg"));
    }
}
