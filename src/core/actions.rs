use crate::core::duplicate::FileRecord;
use crate::core::resolution::Resolution;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_DUPLICATES_DIR: &str = "duplicates";

/// What happens to every duplicate of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Delete,
    Move,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Delete => write!(f, "delete"),
            Action::Move => write!(f, "move"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Failed to delete {path}: {source}")]
    Delete {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {from} → {to}: {source}")]
    Move {
        from: String,
        to: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not inside the scan root")]
    OutsideRoot { path: String },

    #[error("Refusing to move {from}: {to} already exists")]
    TargetExists { from: String, to: String },
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ActionReport {
    pub deleted: usize,
    pub moved: usize,
    pub failed: usize,
    /// Duplicates a dry run would have acted on.
    pub planned: usize,
}

/// Applies one [`Action`] to every duplicate, isolating failures per file.
pub struct ActionExecutor {
    root: PathBuf,
    action: Action,
    duplicates_dir: PathBuf,
    dry_run: bool,
}

impl ActionExecutor {
    pub fn new(root: &Path, action: Action) -> Self {
        Self {
            root: root.to_path_buf(),
            action,
            duplicates_dir: root.join(DEFAULT_DUPLICATES_DIR),
            dry_run: false,
        }
    }

    pub fn with_duplicates_dir(mut self, name: &str) -> Self {
        self.duplicates_dir = self.root.join(name);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// `<root>/duplicates/<relative subdir>/<basename>` for a file under root.
    pub fn move_target(&self, path: &Path) -> Result<PathBuf, ActionError> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| ActionError::OutsideRoot {
                path: path.to_string_lossy().to_string(),
            })?;
        Ok(self.duplicates_dir.join(relative))
    }

    pub fn apply(&self, duplicate: &FileRecord) -> Result<(), ActionError> {
        match self.action {
            Action::Delete => self.delete(duplicate.path()),
            Action::Move => self.relocate(duplicate.path()),
        }
    }

    fn delete(&self, path: &Path) -> Result<(), ActionError> {
        fs::remove_file(path).map_err(|source| ActionError::Delete {
            path: path.to_string_lossy().to_string(),
            source,
        })?;
        log::info!("Deleted {}", path.display());
        Ok(())
    }

    /// Like [`move_target`](Self::move_target), but fails if something already
    /// occupies the target. `rename` would silently replace it on unix.
    fn vacant_target(&self, path: &Path) -> Result<PathBuf, ActionError> {
        let dest = self.move_target(path)?;
        if dest.symlink_metadata().is_ok() {
            return Err(ActionError::TargetExists {
                from: path.to_string_lossy().to_string(),
                to: dest.to_string_lossy().to_string(),
            });
        }
        Ok(dest)
    }

    fn relocate(&self, path: &Path) -> Result<(), ActionError> {
        let dest = self.vacant_target(path)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| ActionError::CreateDir {
                path: parent.to_string_lossy().to_string(),
                source,
            })?;
        }
        fs::rename(path, &dest).map_err(|source| ActionError::Move {
            from: path.to_string_lossy().to_string(),
            to: dest.to_string_lossy().to_string(),
            source,
        })?;
        log::info!("Moved {} → {}", path.display(), dest.display());
        Ok(())
    }

    fn plan(&self, duplicate: &FileRecord) -> Result<(), ActionError> {
        match self.action {
            Action::Delete => {
                log::info!("[dry-run] DELETE {}", duplicate.path.display());
            }
            Action::Move => {
                let dest = self.vacant_target(duplicate.path())?;
                log::info!(
                    "[dry-run] MOVE {} → {}",
                    duplicate.path.display(),
                    dest.display()
                );
            }
        }
        Ok(())
    }

    /// Acts on every duplicate of every resolution. Originals are never touched.
    pub fn execute(&self, resolutions: &[Resolution]) -> ActionReport {
        let mut report = ActionReport::default();

        for resolution in resolutions {
            log::debug!(
                "Keeping {} ({} duplicate(s))",
                resolution.original.path.display(),
                resolution.duplicates.len()
            );
            for duplicate in &resolution.duplicates {
                let result = if self.dry_run {
                    self.plan(duplicate)
                } else {
                    self.apply(duplicate)
                };
                match result {
                    Ok(()) if self.dry_run => report.planned += 1,
                    Ok(()) => match self.action {
                        Action::Delete => report.deleted += 1,
                        Action::Move => report.moved += 1,
                    },
                    Err(e) => {
                        log::warn!("Error handling duplicate {}: {}", duplicate.path.display(), e);
                        report.failed += 1;
                    }
                }
            }
        }

        report
    }
}
