//! Content and perceptual fingerprints, used to confirm that outputs are
//! byte-distinct yet visually close to their source.

use blake3::Hasher as Blake3Hasher;
use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig, ImageHash};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};

/// BLAKE3 of a file's bytes, streamed in 64KB chunks.
pub fn content_hash(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Blake3Hasher::new();

    let mut buffer = [0u8; 65536];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// BLAKE3 of an in-memory buffer.
pub fn content_hash_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Perceptual hasher with a cached configuration.
pub struct PerceptualHasher {
    inner: image_hasher::Hasher,
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PerceptualHasher {
    pub fn new() -> Self {
        let inner = HasherConfig::new()
            .hash_alg(HashAlg::DoubleGradient)
            .hash_size(16, 16)
            .to_hasher();
        Self { inner }
    }

    /// Base64 perceptual hash of a decoded image.
    pub fn hash(&self, image: &DynamicImage) -> String {
        self.inner.hash_image(image).to_base64()
    }

    pub fn hash_file(&self, path: &Path) -> PipelineResult<String> {
        let image = image::open(path).map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(self.hash(&image))
    }

    /// Hamming distance between two base64 hashes; 0 means identical.
    /// `None` if either hash is malformed.
    pub fn distance(a: &str, b: &str) -> Option<u32> {
        let h1 = ImageHash::<Vec<u8>>::from_base64(a).ok()?;
        let h2 = ImageHash::<Vec<u8>>::from_base64(b).ok()?;
        Some(h1.dist(&h2))
    }
}

/// Side-by-side fingerprint of two files.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub a: PathBuf,
    pub b: PathBuf,
    pub content_hash_a: String,
    pub content_hash_b: String,
    pub identical_bytes: bool,
    /// Only present when both files decode as images
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perceptual_distance: Option<u32>,
}

/// Compare two files by content hash and, for images, perceptual distance.
pub fn compare(a: &Path, b: &Path) -> PipelineResult<Comparison> {
    let content_hash_a = content_hash(a).map_err(|e| PipelineError::io(a, e))?;
    let content_hash_b = content_hash(b).map_err(|e| PipelineError::io(b, e))?;

    let hasher = PerceptualHasher::new();
    let perceptual_distance = match (hasher.hash_file(a), hasher.hash_file(b)) {
        (Ok(ha), Ok(hb)) => PerceptualHasher::distance(&ha, &hb),
        _ => None,
    };

    Ok(Comparison {
        a: a.to_path_buf(),
        b: b.to_path_buf(),
        identical_bytes: content_hash_a == content_hash_b,
        content_hash_a,
        content_hash_b,
        perceptual_distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perceptual_hash_consistency() {
        let hasher = PerceptualHasher::new();
        let img = DynamicImage::new_rgb8(100, 100);
        assert_eq!(hasher.hash(&img), hasher.hash(&img));
    }

    #[test]
    fn test_distance_identical_and_invalid() {
        let hasher = PerceptualHasher::new();
        let hash = hasher.hash(&DynamicImage::new_rgb8(64, 64));
        assert_eq!(PerceptualHasher::distance(&hash, &hash), Some(0));
        assert!(PerceptualHasher::distance("invalid", "also_invalid").is_none());
    }

    #[test]
    fn test_content_hash_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        std::fs::write(&path, b"uniq").unwrap();
        assert_eq!(content_hash(&path).unwrap(), content_hash_bytes(b"uniq"));
    }

    #[test]
    fn test_compare_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        std::fs::write(&a, b"one").unwrap();
        std::fs::write(&b, b"two").unwrap();
        let cmp = compare(&a, &b).unwrap();
        assert!(!cmp.identical_bytes);
        assert!(cmp.perceptual_distance.is_none());
    }
}
