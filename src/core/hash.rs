use crate::core::frame::FrameDecoder;
use crate::core::media::MediaKind;
use image::{DynamicImage, ImageReader};
use image_hasher::{HashAlg, HasherConfig};
use serde::{Serialize, Serializer};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("Unsupported file type: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Frame decoder failed: {message}")]
    Decoder { message: String },

    #[error("No frame could be read from {path}")]
    NoFrame { path: String },

    #[error("ffmpeg {found} cannot assemble HEIF grid images; 7.1 or newer is required")]
    HeifUnsupported { found: String },

    #[error("Decoder panicked: {message}")]
    Panicked { message: String },
}

/// Fixed-width perceptual hash. Only equality and ordering are meaningful.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(Box<[u8]>);

impl Fingerprint {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Per-file result of the scan phase. `fingerprint` is `None` for skipped files.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub path: PathBuf,
    pub fingerprint: Option<Fingerprint>,
}

impl ScanOutcome {
    pub fn skipped(path: PathBuf) -> Self {
        Self {
            path,
            fingerprint: None,
        }
    }
}

/// DCT-based perceptual hash shared by the image and video fingerprinters.
pub struct PerceptualHasher {
    hasher: image_hasher::Hasher,
}

impl PerceptualHasher {
    pub fn new(hash_size: u32) -> Self {
        let hasher = HasherConfig::new()
            .hash_size(hash_size, hash_size)
            .hash_alg(HashAlg::Median)
            .preproc_dct()
            .to_hasher();
        Self { hasher }
    }

    pub fn hash_image(&self, img: &DynamicImage) -> Fingerprint {
        Fingerprint::from_bytes(self.hasher.hash_image(img).as_bytes())
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new(8)
    }
}

pub trait Fingerprinter: Send + Sync {
    fn fingerprint(&self, path: &Path) -> Result<Fingerprint, HashError>;
}

/// Decodes still images with the `image` crate; HEIC goes through ffmpeg.
pub struct ImageFingerprinter {
    hasher: Arc<PerceptualHasher>,
    heic_decoder: FrameDecoder,
}

impl ImageFingerprinter {
    pub fn new(hasher: Arc<PerceptualHasher>, heic_decoder: FrameDecoder) -> Self {
        Self {
            hasher,
            heic_decoder,
        }
    }

    fn decode(&self, path: &Path) -> Result<DynamicImage, HashError> {
        if MediaKind::from_path(path) == Some(MediaKind::Heic) {
            return self.heic_decoder.heic_image(path);
        }
        Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
    }
}

impl Fingerprinter for ImageFingerprinter {
    fn fingerprint(&self, path: &Path) -> Result<Fingerprint, HashError> {
        let img = self.decode(path)?;
        Ok(self.hasher.hash_image(&img))
    }
}

/// Hashes only the first decodable frame of a video.
pub struct VideoFingerprinter {
    hasher: Arc<PerceptualHasher>,
    decoder: FrameDecoder,
}

impl VideoFingerprinter {
    pub fn new(hasher: Arc<PerceptualHasher>, decoder: FrameDecoder) -> Self {
        Self { hasher, decoder }
    }
}

impl Fingerprinter for VideoFingerprinter {
    fn fingerprint(&self, path: &Path) -> Result<Fingerprint, HashError> {
        let frame = self.decoder.first_frame(path)?;
        Ok(self.hasher.hash_image(&frame))
    }
}

/// Picks the fingerprinter by extension and turns every failure into a
/// skipped outcome.
pub struct MediaHasher {
    image: ImageFingerprinter,
    video: VideoFingerprinter,
}

impl MediaHasher {
    pub fn new(hash_size: u32, ffmpeg: impl Into<PathBuf>) -> Self {
        let hasher = Arc::new(PerceptualHasher::new(hash_size));
        let decoder = FrameDecoder::new(ffmpeg);
        Self {
            image: ImageFingerprinter::new(hasher.clone(), decoder.clone()),
            video: VideoFingerprinter::new(hasher, decoder),
        }
    }

    pub fn fingerprinter_for(&self, path: &Path) -> Option<&dyn Fingerprinter> {
        match MediaKind::from_path(path)? {
            MediaKind::Image | MediaKind::Heic => Some(&self.image),
            MediaKind::Video => Some(&self.video),
        }
    }

    pub fn try_fingerprint(&self, path: &Path) -> Result<Fingerprint, HashError> {
        let fingerprinter =
            self.fingerprinter_for(path)
                .ok_or_else(|| HashError::UnsupportedFormat {
                    extension: path
                        .extension()
                        .map(|ext| ext.to_string_lossy().to_string())
                        .unwrap_or_default(),
                })?;

        panic::catch_unwind(AssertUnwindSafe(|| fingerprinter.fingerprint(path))).unwrap_or_else(
            |payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(HashError::Panicked { message })
            },
        )
    }

    /// Never fails: unsupported or undecodable files come back skipped.
    pub fn hash(&self, path: PathBuf) -> ScanOutcome {
        match self.try_fingerprint(&path) {
            Ok(fingerprint) => ScanOutcome {
                path,
                fingerprint: Some(fingerprint),
            },
            Err(HashError::UnsupportedFormat { .. }) => ScanOutcome::skipped(path),
            Err(e) => {
                log::debug!("Skipping {}: {}", path.display(), e);
                ScanOutcome::skipped(path)
            }
        }
    }
}

impl Default for MediaHasher {
    fn default() -> Self {
        Self::new(8, "ffmpeg")
    }
}
