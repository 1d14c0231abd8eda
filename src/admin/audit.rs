//! Audit Log Module
//!
//! Append-only JSONL audit trail with SHA256 hash chaining for tamper
//! evidence. Every accepted mutation and service operation is recorded.

use std::path::{Path, PathBuf};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufRead, Write};
use chrono::Utc;
use serde_json::Value;
use sha2::{Sha256, Digest};
use uuid::Uuid;

use crate::admin::types::{AuditEntry, AuditAction, Role};
use crate::admin::error::{AdminError, AdminResult};

/// Audit log manager
#[derive(Debug)]
pub struct AuditLog {
    /// Path to audit log file
    file_path: PathBuf,

    /// Last entry hash (for chaining)
    last_hash: Option<String>,
}

impl AuditLog {
    /// Open or create the audit log at the specified path
    pub fn new<P: AsRef<Path>>(file_path: P) -> AdminResult<Self> {
        let file_path = file_path.as_ref().to_path_buf();

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let last_hash = match Self::read_entries(&file_path)?.last() {
            Some(entry) => Some(entry.hash.clone()),
            None => None,
        };

        Ok(Self {
            file_path,
            last_hash,
        })
    }

    /// Append an entry to the audit log
    pub fn append(&mut self, entry: AuditEntryBuilder) -> AdminResult<AuditEntry> {
        let prev_hash = self.last_hash.as_deref().unwrap_or("");
        let mut audit_entry = entry.build(prev_hash);
        audit_entry.hash = calculate_hash(&audit_entry)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{}", serde_json::to_string(&audit_entry)?)?;
        file.sync_all()?;

        self.last_hash = Some(audit_entry.hash.clone());
        Ok(audit_entry)
    }

    /// Entries matching `filter`, oldest first
    pub fn query(&self, filter: &AuditFilter) -> AdminResult<Vec<AuditEntry>> {
        let mut entries: Vec<AuditEntry> = Self::read_entries(&self.file_path)?
            .into_iter()
            .filter(|entry| filter.matches(entry))
            .collect();

        if let Some(limit) = filter.limit {
            let skip = entries.len().saturating_sub(limit);
            entries.drain(..skip);
        }
        Ok(entries)
    }

    /// Verify audit log integrity by checking hash chain
    pub fn verify_integrity(&self) -> AdminResult<bool> {
        let mut prev_hash = String::new();
        for entry in Self::read_entries(&self.file_path)? {
            if entry.prev_hash != prev_hash || entry.hash != calculate_hash(&entry)? {
                return Ok(false);
            }
            prev_hash = entry.hash;
        }
        Ok(true)
    }

    fn read_entries(file_path: &Path) -> AdminResult<Vec<AuditEntry>> {
        if !file_path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(file_path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str::<AuditEntry>(&line)
                .map_err(|e| AdminError::AuditLog(format!("Invalid entry: {}", e)))?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// SHA256(prev_hash || entry JSON without its hash)
fn calculate_hash(entry: &AuditEntry) -> AdminResult<String> {
    let mut unhashed = entry.clone();
    unhashed.hash = String::new();
    let json = serde_json::to_string(&unhashed)?;

    let mut hasher = Sha256::new();
    hasher.update(entry.prev_hash.as_bytes());
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Builder for creating audit entries
#[derive(Debug)]
pub struct AuditEntryBuilder {
    pub operator: String,
    pub role: Role,
    pub action: AuditAction,
    pub target: String,
    pub version: Option<u64>,
    pub applied: bool,
    pub details: Value,
}

impl AuditEntryBuilder {
    pub fn new(operator: impl Into<String>, role: Role, action: AuditAction, target: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
            role,
            action,
            target: target.into(),
            version: None,
            applied: true,
            details: Value::Null,
        }
    }

    /// Configuration version the action committed
    pub fn version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn applied(mut self, applied: bool) -> Self {
        self.applied = applied;
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    fn build(self, prev_hash: &str) -> AuditEntry {
        AuditEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            operator: self.operator,
            role: self.role,
            action: self.action,
            target: self.target,
            version: self.version,
            applied: self.applied,
            details: self.details,
            prev_hash: prev_hash.to_string(),
            hash: String::new(),
        }
    }
}

/// Filter for querying audit log entries
#[derive(Debug, Default)]
pub struct AuditFilter {
    /// Filter by operator name
    pub operator: Option<String>,

    /// Filter by action type
    pub action: Option<AuditAction>,

    /// Keep only the newest `limit` matches
    pub limit: Option<usize>,
}

impl AuditFilter {
    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(ref operator) = self.operator {
            if entry.operator != *operator {
                return false;
            }
        }
        if let Some(action) = self.action {
            if entry.action != action {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn post_by(user: &str) -> AuditEntryBuilder {
        AuditEntryBuilder::new(user, Role::Operator, AuditAction::ConfigPost, "Forwarder/m2w")
    }

    #[test]
    fn test_hash_chaining() {
        let dir = tempdir().unwrap();
        let mut log = AuditLog::new(dir.path().join("audit.jsonl")).unwrap();

        let first = log.append(post_by("user1").version(2)).unwrap();
        let second = log.append(post_by("user2")).unwrap();

        assert_eq!(first.prev_hash, "");
        assert!(!first.hash.is_empty());
        assert_eq!(second.prev_hash, first.hash);
        assert!(log.verify_integrity().unwrap());
    }

    #[test]
    fn test_chain_continues_after_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let first = AuditLog::new(&path).unwrap().append(post_by("user1")).unwrap();

        let mut reopened = AuditLog::new(&path).unwrap();
        let second = reopened.append(post_by("user2")).unwrap();
        assert_eq!(second.prev_hash, first.hash);
    }

    #[test]
    fn test_tampering_is_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let mut log = AuditLog::new(&path).unwrap();
        log.append(post_by("user1").details(json!({"ServerName": "a"}))).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, content.replace("user1", "mallory")).unwrap();
        assert!(!log.verify_integrity().unwrap());
    }

    #[test]
    fn test_query_filters_and_limits() {
        let dir = tempdir().unwrap();
        let mut log = AuditLog::new(dir.path().join("audit.jsonl")).unwrap();
        for i in 0..4 {
            log.append(post_by(&format!("user{}", i % 2))).unwrap();
        }
        log.append(AuditEntryBuilder::new("admin", Role::Admin, AuditAction::Restart, "Server")).unwrap();

        let filter = AuditFilter { operator: Some("user0".to_string()), ..AuditFilter::default() };
        assert_eq!(log.query(&filter).unwrap().len(), 2);

        let filter = AuditFilter { limit: Some(1), ..AuditFilter::default() };
        let newest = log.query(&filter).unwrap();
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].action, AuditAction::Restart);
    }
}
