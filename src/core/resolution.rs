use crate::core::duplicate::{DuplicateGroup, FileRecord};
use crate::core::hash::Fingerprint;
use serde::Serialize;

/// One group split into the file to keep and the files to act on.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub fingerprint: Fingerprint,
    pub original: FileRecord,
    pub duplicates: Vec<FileRecord>,
}

/// Keeps the oldest file of each group, breaking timestamp ties by basename.
///
/// Creation time is whatever the platform reports; on filesystems without a
/// birth time this is the modification time instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResolutionPolicy;

impl ResolutionPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn sort(&self, files: &mut [FileRecord]) {
        files.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.name.cmp(&b.name)));
    }

    /// Returns `None` for groups of fewer than two files.
    pub fn resolve(&self, group: DuplicateGroup) -> Option<Resolution> {
        if group.files.len() < 2 {
            return None;
        }
        let mut files = group.files;
        self.sort(&mut files);
        let duplicates = files.split_off(1);
        let original = files.pop()?;

        Some(Resolution {
            fingerprint: group.fingerprint,
            original,
            duplicates,
        })
    }

    pub fn resolve_all(&self, groups: Vec<DuplicateGroup>) -> Vec<Resolution> {
        groups
            .into_iter()
            .filter_map(|group| self.resolve(group))
            .collect()
    }
}
