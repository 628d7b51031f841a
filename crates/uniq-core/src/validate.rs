//! Input validation before any job starts.

use std::io::Read;
use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;
use crate::params::MediaKind;

/// ISO-BMFF brands that denote still images rather than video.
const IMAGE_BRANDS: &[&[u8; 4]] = &[b"heic", b"heix", b"mif1", b"msf1", b"avif"];

/// Validates files before processing.
#[derive(Debug, Clone)]
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Check that `path` exists, is within the size limit and starts with
    /// a signature matching `kind`.
    pub fn validate(&self, path: &Path, kind: MediaKind) -> Result<(), PipelineError> {
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PipelineError::FileNotFound(path.to_path_buf()),
            _ => PipelineError::io(path, e),
        })?;
        if !metadata.is_file() {
            return Err(PipelineError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: "not a regular file".to_string(),
            });
        }

        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if metadata.len() > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: metadata.len() / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        let mut header = [0u8; 12];
        let bytes_read = std::fs::File::open(path)
            .and_then(|mut f| f.read(&mut header))
            .map_err(|e| PipelineError::io(path, e))?;

        match sniff(&header[..bytes_read]) {
            Some(found) if found == kind => Ok(()),
            Some(found) => Err(PipelineError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: format!("expected {kind}, found {found}"),
            }),
            None => Err(PipelineError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: "unrecognized signature".to_string(),
            }),
        }
    }
}

/// Classify a file by its first bytes.
pub fn sniff(header: &[u8]) -> Option<MediaKind> {
    if header.len() < 4 {
        return None;
    }
    let starts = |sig: &[u8]| header.starts_with(sig);

    // JPEG, PNG, GIF, BMP, TIFF (LE/BE)
    if starts(&[0xFF, 0xD8, 0xFF])
        || starts(b"\x89PNG")
        || starts(b"GIF8")
        || starts(b"BM")
        || starts(b"II\x2A\x00")
        || starts(b"MM\x00\x2A")
    {
        return Some(MediaKind::Image);
    }

    // RIFF container: WebP image or AVI video
    if starts(b"RIFF") {
        return match header.get(8..12) {
            Some(b"WEBP") => Some(MediaKind::Image),
            Some(b"AVI ") => Some(MediaKind::Video),
            _ => None,
        };
    }

    // Matroska / WebM (EBML)
    if starts(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some(MediaKind::Video);
    }

    // ISO-BMFF: MP4, MOV, M4V, or HEIF/AVIF stills
    if header.get(4..8) == Some(&b"ftyp"[..]) {
        let brand = header.get(8..12)?;
        if IMAGE_BRANDS.iter().any(|b| &b[..] == brand) {
            return Some(MediaKind::Image);
        }
        return Some(MediaKind::Video);
    }

    None
}
