use crate::core::hash::HashError;
use image::{DynamicImage, ImageFormat};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, OnceLock};

/// Oldest ffmpeg that stitches HEIF grid tiles into the full picture. Older
/// releases hand back only the first tile of a grid image.
pub const MIN_HEIF_GRID_VERSION: FfmpegVersion = FfmpegVersion { major: 7, minor: 1 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FfmpegVersion {
    pub major: u32,
    pub minor: u32,
}

impl FfmpegVersion {
    /// Parse the first line of `ffmpeg -version`, e.g.
    /// `ffmpeg version 6.1.1-3ubuntu5 Copyright ...` or `ffmpeg version n7.1 ...`.
    /// Snapshot builds (`N-112233-g...`) carry no release number and yield `None`.
    pub fn parse(banner: &str) -> Option<Self> {
        let line = banner.lines().next()?;
        let (_, rest) = line.split_once("version ")?;
        let token = rest.split_whitespace().next()?;
        let token = token.strip_prefix('n').unwrap_or(token);

        let mut parts = token.split('.');
        let major = leading_number(parts.next()?)?;
        let minor = parts.next().and_then(leading_number).unwrap_or(0);
        Some(Self { major, minor })
    }

    pub fn assembles_heif_grids(&self) -> bool {
        *self >= MIN_HEIF_GRID_VERSION
    }
}

impl fmt::Display for FfmpegVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

fn leading_number(s: &str) -> Option<u32> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s[..end].parse().ok()
}

/// Extracts the first video frame (or the primary HEIC image) by piping it
/// out of an external `ffmpeg` as an RGB PNG.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    ffmpeg: PathBuf,
    banner: Arc<OnceLock<Option<String>>>,
}

impl FrameDecoder {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            banner: Arc::new(OnceLock::new()),
        }
    }

    /// Output of `ffmpeg -version`, run once per decoder.
    fn banner(&self) -> Option<&str> {
        self.banner
            .get_or_init(|| {
                let output = Command::new(&self.ffmpeg)
                    .arg("-version")
                    .stdin(Stdio::null())
                    .stderr(Stdio::null())
                    .output()
                    .ok()?;
                output
                    .status
                    .success()
                    .then(|| String::from_utf8_lossy(&output.stdout).into_owned())
            })
            .as_deref()
    }

    /// Check if the configured ffmpeg binary can be executed.
    pub fn is_available(&self) -> bool {
        self.banner().is_some()
    }

    pub fn version(&self) -> Option<FfmpegVersion> {
        self.banner().and_then(FfmpegVersion::parse)
    }

    /// Decode a HEIC still. Refused outright when the ffmpeg release cannot
    /// be shown to assemble grid images, since a single tile would be hashed.
    pub fn heic_image(&self, path: &Path) -> Result<DynamicImage, HashError> {
        if !self.is_available() {
            return Err(HashError::Decoder {
                message: format!("{} is not available", self.ffmpeg.display()),
            });
        }
        match self.version() {
            Some(version) if version.assembles_heif_grids() => self.first_frame(path),
            found => Err(HashError::HeifUnsupported {
                found: found.map_or_else(|| "unknown".to_string(), |v| v.to_string()),
            }),
        }
    }

    pub fn first_frame(&self, path: &Path) -> Result<DynamicImage, HashError> {
        let output = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args([
                "-frames:v", "1", "-pix_fmt", "rgb24", "-f", "image2pipe", "-vcodec", "png", "-",
            ])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| HashError::Decoder {
                message: format!("failed to run {}: {}", self.ffmpeg.display(), e),
            })?;

        if !output.status.success() {
            return Err(HashError::Decoder {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if output.stdout.is_empty() {
            return Err(HashError::NoFrame {
                path: path.to_string_lossy().to_string(),
            });
        }

        Ok(image::load_from_memory_with_format(
            &output.stdout,
            ImageFormat::Png,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_decoder_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let video = temp_dir.path().join("clip.mp4");
        std::fs::write(&video, b"not really a video").unwrap();

        let decoder = FrameDecoder::new(temp_dir.path().join("no-such-ffmpeg"));
        assert!(!decoder.is_available());
        assert_eq!(decoder.version(), None);
        assert!(matches!(
            decoder.first_frame(&video),
            Err(HashError::Decoder { .. })
        ));
        assert!(matches!(
            decoder.heic_image(&temp_dir.path().join("IMG_0001.heic")),
            Err(HashError::Decoder { .. })
        ));
    }

    #[test]
    fn test_version_parsing() {
        let distro = "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023 the FFmpeg developers\nbuilt with gcc 13";
        assert_eq!(
            FfmpegVersion::parse(distro),
            Some(FfmpegVersion { major: 6, minor: 1 })
        );
        assert_eq!(
            FfmpegVersion::parse("ffmpeg version n7.1 Copyright"),
            Some(FfmpegVersion { major: 7, minor: 1 })
        );
        assert_eq!(
            FfmpegVersion::parse("ffmpeg version 8.0-static https://johnvansickle.com"),
            Some(FfmpegVersion { major: 8, minor: 0 })
        );
        assert_eq!(
            FfmpegVersion::parse("ffmpeg version N-112233-gabcdef Copyright"),
            None
        );
        assert_eq!(FfmpegVersion::parse(""), None);
    }

    #[test]
    fn test_grid_support_threshold() {
        assert!(!FfmpegVersion { major: 6, minor: 1 }.assembles_heif_grids());
        assert!(!FfmpegVersion { major: 7, minor: 0 }.assembles_heif_grids());
        assert!(FfmpegVersion { major: 7, minor: 1 }.assembles_heif_grids());
        assert!(FfmpegVersion { major: 8, minor: 0 }.assembles_heif_grids());
    }

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, banner: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("ffmpeg");
        std::fs::write(&script, format!("#!/bin/sh\necho '{}'\n", banner)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn test_old_ffmpeg_refuses_heic() {
        let temp_dir = TempDir::new().unwrap();
        let heic = temp_dir.path().join("IMG_0001.HEIC");
        std::fs::write(&heic, b"grid image").unwrap();

        let decoder = FrameDecoder::new(fake_ffmpeg(
            temp_dir.path(),
            "ffmpeg version 6.1.1 Copyright (c) 2000-2023",
        ));
        assert!(decoder.is_available());
        assert_eq!(decoder.version(), Some(FfmpegVersion { major: 6, minor: 1 }));
        assert!(matches!(
            decoder.heic_image(&heic),
            Err(HashError::HeifUnsupported { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_snapshot_ffmpeg_refuses_heic() {
        let temp_dir = TempDir::new().unwrap();
        let heic = temp_dir.path().join("IMG_0002.heic");
        std::fs::write(&heic, b"grid image").unwrap();

        let decoder = FrameDecoder::new(fake_ffmpeg(
            temp_dir.path(),
            "ffmpeg version N-112233-gabcdef Copyright",
        ));
        assert!(decoder.is_available());
        assert!(matches!(
            decoder.heic_image(&heic),
            Err(HashError::HeifUnsupported { .. })
        ));
    }
}
