//! Pixel operations on 8-bit RGB buffers.
//!
//! Every operation treats its neutral value (factor 1.0, sigma 0, angle 0)
//! as a strict no-op and returns the input untouched.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use rand::Rng;

const MICRO_DELTAS: [i32; 4] = [-2, -1, 1, 2];

fn is_neutral_factor(factor: f64) -> bool {
    (factor - 1.0).abs() < 1e-9
}

fn clamp_channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// ITU-R 601 luma, as used for greyscale conversion.
fn luma(p: &Rgb<u8>) -> f64 {
    (p[0] as f64 * 299.0 + p[1] as f64 * 587.0 + p[2] as f64 * 114.0) / 1000.0
}

/// Rotate counter-clockwise about the centre, keeping the canvas size.
/// Corners exposed by the rotation are painted with `fill`.
pub fn rotate(img: RgbImage, degrees: f64, fill: Rgb<u8>) -> RgbImage {
    if degrees.abs() < 1e-9 {
        return img;
    }
    let (w, h) = img.dimensions();
    let (sin, cos) = (-degrees).to_radians().sin_cos();
    let cx = (w as f64 - 1.0) / 2.0;
    let cy = (h as f64 - 1.0) / 2.0;

    RgbImage::from_fn(w, h, |x, y| {
        // Inverse mapping: find the source sample for each output pixel.
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let sx = cos * dx + sin * dy + cx;
        let sy = -sin * dx + cos * dy + cy;
        sample_bilinear(&img, sx, sy).unwrap_or(fill)
    })
}

fn sample_bilinear(img: &RgbImage, x: f64, y: f64) -> Option<Rgb<u8>> {
    let (w, h) = img.dimensions();
    if x < -0.5 || y < -0.5 || x > w as f64 - 0.5 || y > h as f64 - 0.5 {
        return None;
    }
    let x = x.clamp(0.0, (w - 1) as f64);
    let y = y.clamp(0.0, (h - 1) as f64);
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);
    let mut out = [0u8; 3];
    for (c, slot) in out.iter_mut().enumerate() {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        *slot = clamp_channel(top * (1.0 - fy) + bottom * fy);
    }
    Some(Rgb(out))
}

/// Scale every channel by `factor`.
pub fn brightness(mut img: RgbImage, factor: f64) -> RgbImage {
    if is_neutral_factor(factor) {
        return img;
    }
    for p in img.pixels_mut() {
        for c in p.0.iter_mut() {
            *c = clamp_channel(*c as f64 * factor);
        }
    }
    img
}

/// Stretch channels away from (or towards) the image's mean grey level.
pub fn contrast(mut img: RgbImage, factor: f64) -> RgbImage {
    if is_neutral_factor(factor) {
        return img;
    }
    let count = (img.width() as u64 * img.height() as u64).max(1);
    let mean = (img.pixels().map(luma).sum::<f64>() / count as f64).round();
    for p in img.pixels_mut() {
        for c in p.0.iter_mut() {
            *c = clamp_channel(mean + (*c as f64 - mean) * factor);
        }
    }
    img
}

/// Blend each pixel with its own grey value; 0 is greyscale, 1 unchanged.
pub fn color(mut img: RgbImage, factor: f64) -> RgbImage {
    if is_neutral_factor(factor) {
        return img;
    }
    for p in img.pixels_mut() {
        let grey = luma(p);
        for c in p.0.iter_mut() {
            *c = clamp_channel(grey + (*c as f64 - grey) * factor);
        }
    }
    img
}

/// Add zero-mean Gaussian noise with standard deviation `sigma`, sampled
/// independently per channel and clipped to the channel range.
pub fn add_noise<R: Rng + ?Sized>(mut img: RgbImage, sigma: f64, rng: &mut R) -> RgbImage {
    if sigma <= 0.0 {
        return img;
    }
    let mut spare: Option<f64> = None;
    for p in img.pixels_mut() {
        for c in p.0.iter_mut() {
            let n = match spare.take() {
                Some(n) => n,
                None => {
                    let (a, b) = box_muller(rng);
                    spare = Some(b);
                    a
                }
            };
            *c = clamp_channel(*c as f64 + n * sigma);
        }
    }
    img
}

/// Two independent standard normal samples.
fn box_muller<R: Rng + ?Sized>(rng: &mut R) -> (f64, f64) {
    let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    let u2: f64 = rng.gen();
    let r = (-2.0 * u1.ln()).sqrt();
    let theta = std::f64::consts::TAU * u2;
    (r * theta.cos(), r * theta.sin())
}

/// Gaussian blur.
pub fn blur(img: RgbImage, sigma: f64) -> RgbImage {
    if sigma <= 0.0 {
        return img;
    }
    imageops::blur(&img, sigma as f32)
}

/// Resize by a small non-zero pixel delta on each axis, never below 1px.
pub fn micro_resize<R: Rng + ?Sized>(img: RgbImage, rng: &mut R) -> RgbImage {
    let (w, h) = img.dimensions();
    let dx = MICRO_DELTAS[rng.gen_range(0..MICRO_DELTAS.len())];
    let dy = MICRO_DELTAS[rng.gen_range(0..MICRO_DELTAS.len())];
    let nw = perturb(w, dx);
    let nh = perturb(h, dy);
    imageops::resize(&img, nw, nh, FilterType::Lanczos3)
}

/// Apply `delta`, flipping its sign when shrinking would go below 1px.
fn perturb(size: u32, delta: i32) -> u32 {
    let shifted = size as i64 + delta as i64;
    if shifted >= 1 {
        shifted as u32
    } else {
        size + delta.unsigned_abs()
    }
}
