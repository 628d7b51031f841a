//! Image transform engine: decode, pixel ops, JPEG re-encode, EXIF stamp.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use rand::Rng;
use std::io::Cursor;
use std::path::Path;
use std::time::{Duration, Instant};

use super::ops;
use crate::config::{ImageConfig, LimitsConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::metadata::{self, SyntheticMetadata};
use crate::params::ImageParams;

/// Runs the fixed image operation sequence. Synchronous and CPU-bound;
/// callers put it on the blocking pool.
#[derive(Debug, Clone)]
pub struct ImageEngine {
    config: ImageConfig,
    limits: LimitsConfig,
}

/// What a successful transform produced.
#[derive(Debug, Clone)]
pub struct ImageOutput {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub metadata: SyntheticMetadata,
}

/// Wall-clock limit for one transform. Checked between stages, so a single
/// pixel op on a huge frame can overrun it by that op's duration.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
    limit: Duration,
}

impl Deadline {
    /// No limit.
    pub fn none() -> Self {
        Self {
            at: None,
            limit: Duration::ZERO,
        }
    }

    /// Expires `limit` from now.
    pub fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(limit),
            limit,
        }
    }

    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    fn check(&self, stage: &str) -> PipelineResult<()> {
        if !self.expired() {
            return Ok(());
        }
        tracing::debug!("  deadline passed after {}", stage);
        Err(PipelineError::Timeout {
            stage: "image".to_string(),
            timeout_ms: self.limit.as_millis() as u64,
        })
    }
}

impl ImageEngine {
    pub fn new(config: ImageConfig, limits: LimitsConfig) -> Self {
        Self { config, limits }
    }

    /// Transform `input` into a JPEG at `output` using the thread RNG.
    pub fn transform(
        &self,
        input: &Path,
        output: &Path,
        params: &ImageParams,
    ) -> PipelineResult<ImageOutput> {
        self.transform_within(input, output, params, Deadline::none())
    }

    /// Like [`transform`](Self::transform), giving up with
    /// [`PipelineError::Timeout`] once `deadline` passes.
    pub fn transform_within(
        &self,
        input: &Path,
        output: &Path,
        params: &ImageParams,
        deadline: Deadline,
    ) -> PipelineResult<ImageOutput> {
        self.transform_with(input, output, params, deadline, &mut rand::thread_rng())
    }

    /// Transform with an explicit RNG (noise, micro-resize, quality).
    ///
    /// The output file only appears once every stage has succeeded.
    pub fn transform_with<R: Rng + ?Sized>(
        &self,
        input: &Path,
        output: &Path,
        params: &ImageParams,
        deadline: Deadline,
        rng: &mut R,
    ) -> PipelineResult<ImageOutput> {
        let start = Instant::now();
        let rgb = self.decode(input)?;
        tracing::debug!("  decode: {:?}", start.elapsed());
        deadline.check("decode")?;

        let t = Instant::now();
        let img = self.apply(rgb, params, rng, deadline)?;
        tracing::debug!("  pixel ops: {:?}", t.elapsed());

        let t = Instant::now();
        let quality = rng.gen_range(self.config.quality_min..=self.config.quality_max);
        let encoded = encode_jpeg(&img, quality)?;
        tracing::debug!("  encode q={}: {:?}", quality, t.elapsed());
        deadline.check("encode")?;

        let meta = SyntheticMetadata::generate_with(rng);
        let stamped = metadata::stamp_jpeg(&encoded, &meta).map_err(|e| PipelineError::Metadata {
            path: output.to_path_buf(),
            message: e.to_string(),
        })?;
        metadata::write_atomic(output, &stamped)?;

        Ok(ImageOutput {
            width: img.width(),
            height: img.height(),
            quality,
            metadata: meta,
        })
    }

    /// Pixel operations in their fixed order. Micro-resize always runs last.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        img: RgbImage,
        params: &ImageParams,
        rng: &mut R,
        deadline: Deadline,
    ) -> PipelineResult<RgbImage> {
        let img = ops::rotate(img, params.rotation_deg, Rgb(self.config.fill));
        deadline.check("rotate")?;
        let img = ops::brightness(img, params.brightness);
        deadline.check("brightness")?;
        let img = ops::contrast(img, params.contrast);
        deadline.check("contrast")?;
        let img = ops::color(img, params.color);
        deadline.check("color")?;
        let img = ops::add_noise(img, params.noise_sigma, rng);
        deadline.check("noise")?;
        let img = ops::blur(img, params.blur_sigma);
        deadline.check("blur")?;
        let img = ops::micro_resize(img, rng);
        deadline.check("micro-resize")?;
        Ok(img)
    }

    /// Decode any supported raster format and normalise to 8-bit RGB.
    fn decode(&self, path: &Path) -> PipelineResult<RgbImage> {
        let reader = image::ImageReader::open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => PipelineError::FileNotFound(path.to_path_buf()),
                _ => PipelineError::io(path, e),
            })?
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot detect image format: {}", e),
            })?;
        let image = reader.decode().map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let (width, height) = image.dimensions();
        let max_dim = self.limits.max_image_dimension;
        if width > max_dim || height > max_dim {
            return Err(PipelineError::ImageTooLarge {
                path: path.to_path_buf(),
                width,
                height,
                max_dim,
            });
        }
        Ok(to_rgb(image))
    }
}

/// Flatten alpha onto white; every other colour mode converts directly.
fn to_rgb(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.into_rgb8();
    }
    let rgba = image.into_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y);
        let a = p[3] as u16;
        let blend = |c: u8| ((c as u16 * a + 255 * (255 - a)) / 255) as u8;
        Rgb([blend(p[0]), blend(p[1]), blend(p[2])])
    })
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> PipelineResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(img)
        .map_err(|e| PipelineError::Engine {
            stage: "jpeg encode".to_string(),
            message: e.to_string(),
        })?;
    Ok(buf.into_inner())
}
