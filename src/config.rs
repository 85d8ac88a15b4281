use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use crate::core::actions::DEFAULT_DUPLICATES_DIR;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Engine settings. Missing keys fall back to [`Config::default`].
///
/// ```toml
/// workers = 4
/// queue_capacity = 64
/// ffmpeg = "/usr/local/bin/ffmpeg"
/// duplicates_dir = "duplicates"
/// hash_size = 8
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hashing threads; 0 means one per logical CPU.
    pub workers: usize,
    /// Depth of the bounded task queue; 0 means four per worker.
    pub queue_capacity: usize,
    /// Decoder for video first frames and HEIC images.
    pub ffmpeg: PathBuf,
    /// Directory under the scan root that receives moved duplicates.
    pub duplicates_dir: String,
    /// Fingerprint side length in bits.
    pub hash_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity: 0,
            ffmpeg: PathBuf::from("ffmpeg"),
            duplicates_dir: DEFAULT_DUPLICATES_DIR.to_string(),
            hash_size: 8,
        }
    }
}

impl Config {
    /// `<config dir>/dedupe/config.toml`, e.g. `~/.config/dedupe/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dedupe").join("config.toml"))
    }

    /// Load `explicit` if given, otherwise the default path if it exists,
    /// otherwise built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string_lossy().to_string(),
            source,
        })?;
        log::debug!("Loaded config from {}", path.display());
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string_lossy().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=64).contains(&self.hash_size) {
            return Err(ConfigError::Invalid {
                message: format!("hash_size must be between 2 and 64, got {}", self.hash_size),
            });
        }

        let mut components = Path::new(&self.duplicates_dir).components();
        let single_dir = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single_dir {
            return Err(ConfigError::Invalid {
                message: format!(
                    "duplicates_dir must be a plain directory name, got {:?}",
                    self.duplicates_dir
                ),
            });
        }

        Ok(())
    }

    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.duplicates_dir, "duplicates");
        assert_eq!(config.hash_size, 8);
        assert_eq!(config.ffmpeg, PathBuf::from("ffmpeg"));
        assert_eq!(config.effective_workers(), num_cpus::get().max(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "workers = 3\nffmpeg = \"/opt/ffmpeg/bin/ffmpeg\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.effective_workers(), 3);
        assert_eq!(config.ffmpeg, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.duplicates_dir, "duplicates");
        assert_eq!(config.hash_size, 8);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = Config::load(Some(&temp_dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "workers = \"many\"").unwrap();

        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validation() {
        let config = Config {
            hash_size: 1,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        for bad in ["", "a/b", "..", "/abs"] {
            let config = Config {
                duplicates_dir: bad.to_string(),
                ..Config::default()
            };
            assert!(config.validate().is_err(), "{:?} should be rejected", bad);
        }
    }
}
