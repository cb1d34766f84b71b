use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{DocsmithError, Result};

/// Calculate the SHA256 fingerprint of file content
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cache record for one source file that has had an artifact generated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Source file the artifact was generated from
    pub source_path: String,

    /// Fingerprint of the source content at generation time
    pub source_fingerprint: String,

    /// Where the generated artifact lives
    pub artifact_path: PathBuf,

    /// When the entry was last written
    pub last_modified: DateTime<Utc>,
}

/// Durable mapping from source path to its generated artifact.
///
/// Exclusively owned and mutated by the update orchestrator; loaded at the
/// start of a pass, persisted at the end and after each successful
/// regeneration so a crash loses at most one file's progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocsCache {
    entries: BTreeMap<String, CacheEntry>,
}

impl DocsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&CacheEntry> {
        self.entries.get(path)
    }

    /// Create a new entry, overwriting any prior entry for the path
    pub fn add(&mut self, path: &str, content: &str, artifact_path: &Path) {
        self.entries.insert(
            path.to_string(),
            CacheEntry {
                source_path: path.to_string(),
                source_fingerprint: fingerprint(content),
                artifact_path: artifact_path.to_path_buf(),
                last_modified: Utc::now(),
            },
        );
    }

    /// Replace an existing entry's fingerprint, artifact path and
    /// timestamp. Calling this for an unknown path is a programming error.
    pub fn update(&mut self, path: &str, content: &str, artifact_path: &Path) -> Result<()> {
        let entry = self.entries.get_mut(path).ok_or_else(|| {
            DocsmithError::CacheConsistency(format!("{} not found in cache", path))
        })?;

        entry.source_fingerprint = fingerprint(content);
        entry.artifact_path = artifact_path.to_path_buf();
        entry.last_modified = Utc::now();
        Ok(())
    }

    pub fn remove(&mut self, path: &str) -> Option<CacheEntry> {
        self.entries.remove(path)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    /// The single authoritative skip condition: a file is unchanged since
    /// its last artifact iff the content fingerprints match. Modification
    /// times are unreliable across checkouts and branches, so they are
    /// never consulted.
    pub fn is_fresh(&self, path: &str, content: &str) -> bool {
        self.get(path)
            .map(|entry| entry.source_fingerprint == fingerprint(content))
            .unwrap_or(false)
    }

    /// Load the cache from disk, starting empty when no file exists yet
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Persist the cache as pretty JSON. The write goes through a sibling
    /// temp file and a rename so an interrupted save never truncates the
    /// previous state.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}
