use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which fingerprinter handles a file, decided purely by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    /// HEIC is a still image but goes through the external frame decoder.
    Heic,
    Video,
}

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];
pub const HEIC_EXTENSIONS: &[&str] = &["heic"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov"];

impl MediaKind {
    /// Detect the media kind from a file extension, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if HEIC_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Heic)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}
