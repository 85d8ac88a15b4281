use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    #[error("Cannot read {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Recursively lists every regular file below a root directory.
pub struct FileEnumerator {
    root: PathBuf,
}

impl FileEnumerator {
    /// The root is canonicalized so every yielded path is absolute.
    pub fn new(root: &Path) -> Result<Self, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::InvalidPath {
                path: format!("{} is not a directory", root.to_string_lossy()),
            });
        }
        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree. An unreadable root is an error; unreadable
    /// subdirectories are skipped.
    pub fn discover_files(&self) -> Result<Vec<PathBuf>, ScanError> {
        let mut discovered_files = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(ScanError::Walk {
                        path: self.root.to_string_lossy().to_string(),
                        source: err,
                    });
                }
                Err(err) => {
                    log::debug!("Skipping unreadable entry: {}", err);
                    continue;
                }
            };

            if entry.file_type().is_file() {
                discovered_files.push(entry.into_path());
            }
        }

        Ok(discovered_files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discovers_nested_files() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(temp_dir.path().join("top.jpg"), b"x").unwrap();
        fs::write(nested.join("deep.txt"), b"y").unwrap();

        let enumerator = FileEnumerator::new(temp_dir.path()).unwrap();
        let mut files = enumerator.discover_files().unwrap();
        files.sort();

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| p.is_absolute()));
        assert!(files.iter().any(|p| p.ends_with("a/b/deep.txt")));
        assert!(files.iter().any(|p| p.ends_with("top.jpg")));
    }

    #[test]
    fn test_directories_are_not_listed() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("empty").join("also_empty")).unwrap();

        let enumerator = FileEnumerator::new(temp_dir.path()).unwrap();
        assert!(enumerator.discover_files().unwrap().is_empty());
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");

        let result = FileEnumerator::new(&missing);
        assert!(matches!(result, Err(ScanError::InvalidPath { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_is_skipped_but_unreadable_root_fails() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("root");
        let locked = root.join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(root.join("visible.jpg"), b"x").unwrap();
        fs::write(locked.join("hidden.jpg"), b"y").unwrap();

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // root ignores permission bits
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let enumerator = FileEnumerator::new(&root).unwrap();
        let files = enumerator.discover_files().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("visible.jpg"));

        fs::set_permissions(&root, fs::Permissions::from_mode(0o000)).unwrap();
        let result = enumerator.discover_files();

        fs::set_permissions(&root, fs::Permissions::from_mode(0o755)).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(matches!(result, Err(ScanError::Walk { .. })));
    }

    #[test]
    fn test_file_root_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.jpg");
        fs::write(&file, b"x").unwrap();

        assert!(matches!(
            FileEnumerator::new(&file),
            Err(ScanError::InvalidPath { .. })
        ));
    }
}
