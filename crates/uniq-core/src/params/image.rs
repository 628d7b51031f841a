//! Image transform parameters.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::value::{resolve_or, Value};

/// User-facing image transform spec. Unset fields are skipped.
///
/// Scales: `rotation` in degrees (-10..10); `brightness`, `contrast` and
/// `color` on a -10..10 scale where 0 leaves the image untouched; `noise`
/// is the Gaussian sigma in channel units (0..10); `blur` 0..10 maps to a
/// Gaussian sigma of `blur / 5`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blur: Option<Value>,
}

impl ImageSpec {
    /// The randomized spec used when the caller supplies none.
    pub fn defaults() -> Self {
        Self {
            rotation: Some(Value::range(-2.0, 2.0)),
            brightness: Some(Value::range(-0.1, 0.2)),
            contrast: Some(Value::range(-0.1, 0.2)),
            color: Some(Value::range(-0.1, 0.2)),
            noise: Some(Value::range(2.0, 5.0)),
            blur: Some(Value::range(0.5, 1.5)),
        }
    }

    /// Every operation pinned to its no-op value.
    pub fn neutral() -> Self {
        Self {
            rotation: Some(Value::Fixed(0.0)),
            brightness: Some(Value::Fixed(0.0)),
            contrast: Some(Value::Fixed(0.0)),
            color: Some(Value::Fixed(0.0)),
            noise: Some(Value::Fixed(0.0)),
            blur: Some(Value::Fixed(0.0)),
        }
    }

    /// Sample every range once, producing the concrete parameters for one job.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> ImageParams {
        ImageParams {
            rotation_deg: resolve_or(self.rotation, rng, -10.0, 10.0, 0.0),
            brightness: enhance_factor(resolve_or(self.brightness, rng, -10.0, 10.0, 0.0)),
            contrast: enhance_factor(resolve_or(self.contrast, rng, -10.0, 10.0, 0.0)),
            color: enhance_factor(resolve_or(self.color, rng, -10.0, 10.0, 0.0)),
            noise_sigma: resolve_or(self.noise, rng, 0.0, 10.0, 0.0),
            blur_sigma: resolve_or(self.blur, rng, 0.0, 10.0, 0.0) / 5.0,
        }
    }
}

/// Map the human -10..10 scale onto a multiplicative factor centred at 1.0.
fn enhance_factor(value: f64) -> f64 {
    1.0 + value / 20.0
}

/// Concrete image parameters for one job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImageParams {
    /// Counter-clockwise rotation in degrees
    pub rotation_deg: f64,
    /// Brightness factor (1.0 = unchanged)
    pub brightness: f64,
    /// Contrast factor (1.0 = unchanged)
    pub contrast: f64,
    /// Saturation factor (1.0 = unchanged)
    pub color: f64,
    /// Additive Gaussian noise sigma (0 = none)
    pub noise_sigma: f64,
    /// Gaussian blur sigma (0 = none)
    pub blur_sigma: f64,
}

impl ImageParams {
    /// Parameters that leave every pixel operation disabled.
    pub fn identity() -> Self {
        Self {
            rotation_deg: 0.0,
            brightness: 1.0,
            contrast: 1.0,
            color: 1.0,
            noise_sigma: 0.0,
            blur_sigma: 0.0,
        }
    }
}
