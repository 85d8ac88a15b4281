use crate::core::hash::{Fingerprint, ScanOutcome};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("Failed to read metadata for {path}: {source}")]
    Metadata {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    #[serde(serialize_with = "serialize_time")]
    pub created: SystemTime,
    pub name: String,
}

fn serialize_time<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&DateTime::<Utc>::from(*time).to_rfc3339())
}

impl FileRecord {
    pub fn new(path: PathBuf, created: SystemTime) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            path,
            created,
            name,
        }
    }

    /// Reads the creation time, falling back to the modification time where
    /// the platform or filesystem does not record one.
    pub fn read(path: PathBuf) -> Result<Self, GroupError> {
        let metadata = fs::metadata(&path).map_err(|source| GroupError::Metadata {
            path: path.to_string_lossy().to_string(),
            source,
        })?;
        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map_err(|source| GroupError::Metadata {
                path: path.to_string_lossy().to_string(),
                source,
            })?;
        Ok(Self::new(path, created))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Files sharing one fingerprint, in scan delivery order.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub fingerprint: Fingerprint,
    pub files: Vec<FileRecord>,
}

/// Accumulates fingerprinted files by fingerprint.
///
/// Owned and mutated by the single thread that drains the scan stream;
/// workers only ever send outcomes, never touch the map.
#[derive(Debug, Default)]
pub struct DuplicateGrouper {
    groups: BTreeMap<Fingerprint, Vec<FileRecord>>,
    fingerprinted: usize,
    skipped: usize,
}

impl DuplicateGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the outcome carried no fingerprint.
    pub fn insert(&mut self, outcome: ScanOutcome) -> Result<bool, GroupError> {
        let Some(fingerprint) = outcome.fingerprint else {
            self.skipped += 1;
            return Ok(false);
        };

        let record = FileRecord::read(outcome.path)?;
        self.groups.entry(fingerprint).or_default().push(record);
        self.fingerprinted += 1;
        Ok(true)
    }

    pub fn fingerprinted(&self) -> usize {
        self.fingerprinted
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Groups with at least two members, ordered by fingerprint.
    pub fn into_groups(self) -> Vec<DuplicateGroup> {
        self.groups
            .into_iter()
            .filter(|(_, files)| files.len() > 1)
            .map(|(fingerprint, files)| DuplicateGroup { fingerprint, files })
            .collect()
    }
}
