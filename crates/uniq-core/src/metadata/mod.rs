//! Metadata randomizer.
//!
//! Generates synthetic provenance (EXIF for stills, container tags for
//! video) and implements the file-level strip, stamp and copy operations.
//! JPEG files are edited at the marker-segment level so pixel data is never
//! re-encoded; other raster formats are re-encoded without metadata.

mod container;
mod exif;
mod jpeg;
mod synthetic;

pub use container::ContainerTags;
pub use self::exif::{read_bytes, ExifSummary};
pub use jpeg::{is_jpeg, JpegError, MAX_SEGMENT_PAYLOAD};
pub use synthetic::{Dms, SyntheticMetadata};

use std::io::Write;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};

/// Fresh synthetic EXIF provenance.
pub fn generate() -> SyntheticMetadata {
    SyntheticMetadata::generate()
}

fn metadata_err(path: &Path, message: impl ToString) -> PipelineError {
    PipelineError::Metadata {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Strip source metadata from an in-memory JPEG and stamp `meta` into it.
pub fn stamp_jpeg(bytes: &[u8], meta: &SyntheticMetadata) -> Result<Vec<u8>, JpegError> {
    let tiff = self::exif::encode(meta).map_err(|e| JpegError::Exif(e.to_string()))?;
    let stripped = jpeg::strip(bytes)?;
    jpeg::insert_exif(&stripped, &tiff)
}

/// Remove all metadata from `path` in place.
pub fn strip(path: &Path) -> PipelineResult<()> {
    strip_to(path, path)
}

/// Write a metadata-free copy of `input` to `output` (may be the same path).
pub fn strip_to(input: &Path, output: &Path) -> PipelineResult<()> {
    let bytes = std::fs::read(input).map_err(|e| read_err(input, e))?;
    if jpeg::is_jpeg(&bytes) {
        let stripped = jpeg::strip(&bytes).map_err(|e| metadata_err(input, e))?;
        return write_atomic(output, &stripped);
    }

    let format = image::guess_format(&bytes).map_err(|e| PipelineError::UnsupportedFormat {
        path: input.to_path_buf(),
        format: e.to_string(),
    })?;
    let img = image::load_from_memory_with_format(&bytes, format).map_err(|e| {
        PipelineError::Decode {
            path: input.to_path_buf(),
            message: e.to_string(),
        }
    })?;
    let mut encoded = std::io::Cursor::new(Vec::new());
    img.write_to(&mut encoded, format)
        .map_err(|e| metadata_err(input, format!("re-encode as {format:?}: {e}")))?;
    write_atomic(output, &encoded.into_inner())
}

/// Copy the EXIF block of `source` into `target`, writing the result to
/// `output`. Both images must be JPEG.
pub fn copy(source: &Path, target: &Path, output: &Path) -> PipelineResult<()> {
    let source_bytes = std::fs::read(source).map_err(|e| read_err(source, e))?;
    let target_bytes = std::fs::read(target).map_err(|e| read_err(target, e))?;
    ensure_jpeg(source, &source_bytes)?;
    ensure_jpeg(target, &target_bytes)?;

    let tiff = jpeg::extract_exif(&source_bytes)
        .map_err(|e| metadata_err(source, e))?
        .ok_or_else(|| metadata_err(source, "source has no EXIF data"))?;
    let merged = jpeg::insert_exif(&target_bytes, tiff).map_err(|e| metadata_err(target, e))?;
    write_atomic(output, &merged)
}

/// Replace the metadata of a JPEG at `path` with fresh synthetic provenance.
pub fn randomize(path: &Path) -> PipelineResult<SyntheticMetadata> {
    let bytes = std::fs::read(path).map_err(|e| read_err(path, e))?;
    ensure_jpeg(path, &bytes)?;
    let meta = generate();
    let stamped = stamp_jpeg(&bytes, &meta).map_err(|e| metadata_err(path, e))?;
    write_atomic(path, &stamped)?;
    Ok(meta)
}

/// Parsed EXIF summary of an image file, or `None` if it carries none.
pub fn read(path: &Path) -> Option<ExifSummary> {
    self::exif::read(path)
}

fn ensure_jpeg(path: &Path, bytes: &[u8]) -> PipelineResult<()> {
    if jpeg::is_jpeg(bytes) {
        Ok(())
    } else {
        Err(PipelineError::UnsupportedFormat {
            path: path.to_path_buf(),
            format: image::guess_format(bytes)
                .map(|f| format!("{f:?}").to_lowercase())
                .unwrap_or_else(|_| "unknown".to_string()),
        })
    }
}

fn read_err(path: &Path, e: std::io::Error) -> PipelineError {
    if e.kind() == std::io::ErrorKind::NotFound {
        PipelineError::FileNotFound(path.to_path_buf())
    } else {
        PipelineError::io(path, e)
    }
}

/// Write via a sibling temp file and rename, so readers never see a
/// half-written image.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> PipelineResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| PipelineError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| PipelineError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| PipelineError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb};

    fn write_jpeg(path: &Path) {
        let img = ImageBuffer::from_fn(32, 24, |x, y| Rgb([(x * 8) as u8, (y * 10) as u8, 128]));
        img.save_with_format(path, ImageFormat::Jpeg).unwrap();
    }

    #[test]
    fn test_randomize_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        write_jpeg(&path);
        assert!(read(&path).is_none());

        let meta = randomize(&path).unwrap();
        let summary = read(&path).unwrap();
        assert_eq!(summary.camera_make.as_deref(), Some(meta.make.as_str()));
        assert_eq!(summary.camera_model.as_deref(), Some(meta.model.as_str()));

        // Still decodes as an image
        assert!(image::open(&path).is_ok());
    }

    #[test]
    fn test_strip_removes_exif() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        write_jpeg(&path);
        randomize(&path).unwrap();

        strip(&path).unwrap();
        assert!(read(&path).is_none());
        assert!(image::open(&path).is_ok());
    }

    #[test]
    fn test_strip_png_reencodes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.png");
        let output = dir.path().join("b.png");
        ImageBuffer::from_pixel(8, 8, Rgb([1u8, 2, 3]))
            .save_with_format(&input, ImageFormat::Png)
            .unwrap();
        strip_to(&input, &output).unwrap();
        let out = image::open(&output).unwrap().to_rgb8();
        assert_eq!(out.get_pixel(0, 0), &Rgb([1, 2, 3]));
    }

    #[test]
    fn test_copy_transplants_exif() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.jpg");
        let target = dir.path().join("dst.jpg");
        let output = dir.path().join("out.jpg");
        write_jpeg(&source);
        write_jpeg(&target);
        let meta = randomize(&source).unwrap();

        copy(&source, &target, &output).unwrap();
        let summary = read(&output).unwrap();
        assert_eq!(summary.camera_model.as_deref(), Some(meta.model.as_str()));
    }

    #[test]
    fn test_copy_without_source_exif_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.jpg");
        let target = dir.path().join("dst.jpg");
        write_jpeg(&source);
        write_jpeg(&target);

        let err = copy(&source, &target, &dir.path().join("out.jpg")).unwrap_err();
        assert!(matches!(err, PipelineError::Metadata { .. }));
        assert!(!dir.path().join("out.jpg").exists());
    }

    #[test]
    fn test_strip_missing_file() {
        let err = strip(Path::new("/nonexistent/a.jpg")).unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound(_)));
    }

    #[test]
    fn test_stamped_metadata_differs_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        write_jpeg(&path);
        let bytes = std::fs::read(&path).unwrap();
        let a = stamp_jpeg(&bytes, &generate()).unwrap();
        let b = stamp_jpeg(&bytes, &generate()).unwrap();
        assert_ne!(a, b);
    }
}
